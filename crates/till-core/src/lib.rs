//! # Till Core
//!
//! 核心資料模型與類型定義（金種、在高、政策、計劃記錄）

pub mod config;
pub mod denomination;
pub mod inventory;
pub mod plan;

// Re-export 主要類型
pub use config::{Policy, RollCeilingException};
pub use denomination::{
    format_yen, DenomCounts, Denomination, DenominationKind, MAX_PIECES, ROLL_SIZE,
};
pub use inventory::Inventory;
pub use plan::{
    AllocationGroup, Combination, DeficitRecord, DenomLine, GroupKind, Party, Step, StepAction,
    StepKind, SurplusRecord,
};

/// 調撥計劃錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum TillError {
    #[error("無效的金種面額: {0}")]
    InvalidDenomination(u32),

    #[error("紙幣沒有棒金: {0}")]
    RollsOnNote(Denomination),

    #[error("{denomination} 數量過大：{pieces} 枚超過上限 {limit} 枚")]
    TooManyPieces {
        denomination: Denomination,
        pieces: u64,
        limit: u32,
    },

    #[error("{denomination} 庫存不足：需要 {requested} 枚，可用 {available} 枚")]
    InsufficientStock {
        denomination: Denomination,
        requested: u32,
        available: u32,
    },

    #[error("{party}的{base_note}不足：需要 {needed} 張，庫存 {available} 張")]
    InsufficientBaseNotes {
        party: Party,
        base_note: Denomination,
        needed: u32,
        available: u32,
    },

    #[error("無法以餘裕金種組出 ¥{target}，餘裕金種: {pool}")]
    CombinationNotFound { target: u64, pool: DenomCounts },

    #[error("超過最大反覆次數 {0}，無法決定出金額")]
    IterationLimitExceeded(usize),

    #[error("{0}沒有餘裕金種")]
    NoSurplus(Party),

    #[error("{party}的庫存無法組出找零 ¥{amount}，差額 ¥{remaining}")]
    ChangeUnavailable {
        party: Party,
        amount: u64,
        remaining: u64,
    },

    #[error("找零計算出現餘數 ¥{0}")]
    ChangeRemainder(u64),

    #[error("配置錯誤: {0}")]
    InvalidPolicy(String),

    #[error("JSON 解析錯誤: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TillError>;
