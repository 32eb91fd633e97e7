//! 調撥計劃模型

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::denomination::{format_yen, DenomCounts, Denomination};

/// 交易對象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// 供應側收銀機（持有棒金）
    RegisterA,
    /// 補足對象收銀機
    RegisterB,
    /// 兌換機
    Machine,
}

impl Party {
    pub const ALL: [Party; 3] = [Party::RegisterA, Party::RegisterB, Party::Machine];

    pub fn is_register(self) -> bool {
        !matches!(self, Party::Machine)
    }

    /// 在帳戶表中的位置
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Party::RegisterA => "收銀機A",
            Party::RegisterB => "收銀機B",
            Party::Machine => "兌換機",
        };
        write!(f, "{}", name)
    }
}

/// 不足記錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeficitRecord {
    pub denomination: Denomination,

    /// 不足數量
    pub quantity: u32,

    /// 現有可用數量
    pub current: u32,

    /// 說明（散裝 / 棒金組成）
    pub rationale: String,
}

impl DeficitRecord {
    pub fn value(&self) -> u64 {
        u64::from(self.quantity) * u64::from(self.denomination.value())
    }
}

/// 餘裕記錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusRecord {
    pub denomination: Denomination,

    /// 餘裕數量
    pub quantity: u32,

    /// 現有可用數量
    pub current: u32,

    /// 說明（散裝 / 棒金組成）
    pub rationale: String,
}

impl SurplusRecord {
    pub fn value(&self) -> u64 {
        u64::from(self.quantity) * u64::from(self.denomination.value())
    }
}

/// 分組類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    /// 由收銀機A供應的不足
    #[serde(rename = "LA")]
    La,
    /// 需兌換機處理的不足
    #[serde(rename = "LB")]
    Lb,
    /// 收銀機A自身的補充需求
    #[serde(rename = "LC")]
    Lc,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupKind::La => "LA",
            GroupKind::Lb => "LB",
            GroupKind::Lc => "LC",
        };
        write!(f, "{}", name)
    }
}

/// 分配分組（金種 → 數量）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationGroup {
    pub kind: GroupKind,
    pub counts: DenomCounts,
}

impl AllocationGroup {
    pub fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            counts: DenomCounts::new(),
        }
    }

    /// 建構器模式：設置初始數量
    pub fn with_counts(mut self, counts: DenomCounts) -> Self {
        self.counts = counts;
        self
    }

    pub fn insert(&mut self, denomination: Denomination, quantity: u32) {
        self.counts.increase(denomination, quantity);
    }

    /// 移出金種，返回原數量
    pub fn remove(&mut self, denomination: Denomination) -> u32 {
        self.counts.take(denomination)
    }

    pub fn contains(&self, denomination: Denomination) -> bool {
        self.counts.contains(denomination)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total_value(&self) -> u64 {
        self.counts.total_value()
    }
}

/// 金種組合（恆滿足 Σ 面額 × 數量 = amount）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    pub breakdown: DenomCounts,
    pub amount: u64,
    pub pieces: u64,
}

impl Combination {
    /// 由明細建立，金額與枚數由明細推導
    pub fn from_breakdown(breakdown: DenomCounts) -> Self {
        Self {
            amount: breakdown.total_value(),
            pieces: breakdown.pieces(),
            breakdown,
        }
    }

    pub fn empty() -> Self {
        Self::from_breakdown(DenomCounts::new())
    }
}

/// 步驟中的單一金種說明列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenomLine {
    pub denomination: Denomination,
    pub quantity: u32,
    pub remark: String,
}

impl DenomLine {
    pub fn new(denomination: Denomination, quantity: u32, remark: impl Into<String>) -> Self {
        Self {
            denomination,
            quantity,
            remark: remark.into(),
        }
    }
}

/// 步驟種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Info,
    Transfer,
    MachineExchange,
    Warning,
    Error,
}

/// 步驟內容（依種類帶有型別化的內容）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    /// 資訊（分析結果、分組摘要等）
    Info {
        title: String,
        lines: Vec<DenomLine>,
    },

    /// 現金移動
    Transfer {
        from: Party,
        to: Party,
        breakdown: DenomCounts,
    },

    /// 兌換機操作：投入基準紙幣，取出申請金種與找零
    MachineExchange {
        register: Party,
        inserted: DenomCounts,
        dispensed: DenomCounts,
        deposit_basis: u64,
        change: DenomCounts,
    },

    /// 警告（計劃繼續）
    Warning {
        title: String,
        message: String,
        lines: Vec<DenomLine>,
    },

    /// 致命錯誤（本次計劃中止）
    Error { message: String },
}

impl StepAction {
    pub fn kind(&self) -> StepKind {
        match self {
            StepAction::Info { .. } => StepKind::Info,
            StepAction::Transfer { .. } => StepKind::Transfer,
            StepAction::MachineExchange { .. } => StepKind::MachineExchange,
            StepAction::Warning { .. } => StepKind::Warning,
            StepAction::Error { .. } => StepKind::Error,
        }
    }
}

/// 步驟
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 序號（從 1 開始）
    pub ordinal: usize,

    pub action: StepAction,

    /// 合計金額
    pub total: Option<u64>,

    /// 理由說明
    pub rationale: String,

    /// 是否需要人工實際操作
    pub requires_action: bool,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        self.action.kind()
    }

    pub fn is_error(&self) -> bool {
        self.kind() == StepKind::Error
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "【步驟{}】", self.ordinal)?;
        match &self.action {
            StepAction::Info { title, .. } => write!(f, " {}", title)?,
            StepAction::Transfer { from, to, breakdown } => {
                write!(f, " {} → {}: {}", from, to, breakdown)?
            }
            StepAction::MachineExchange {
                register,
                inserted,
                dispensed,
                ..
            } => write!(f, " 兌換機（{}）投入 {} / 取出 {}", register, inserted, dispensed)?,
            StepAction::Warning { title, message, .. } => write!(f, " ⚠ {}: {}", title, message)?,
            StepAction::Error { message } => write!(f, " ✖ {}", message)?,
        }
        if let Some(total) = self.total {
            write!(f, " 合計 {}", format_yen(total))?;
        }
        Ok(())
    }
}
