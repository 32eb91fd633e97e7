//! # Till Calculation Engine
//!
//! 現金調撥計算引擎

pub mod analyzer;
pub mod exchange;
pub mod grouping;
pub mod ledger;
pub mod planner;
pub mod replenishment;
pub mod search;
pub mod step_log;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use till_core::{Step, StepKind};
use uuid::Uuid;

// Re-export 主要類型
pub use analyzer::{Analyzer, RegisterAnalysis};
pub use exchange::{ExchangeMachine, MachineExchange};
pub use grouping::{AllocationGrouper, GroupingOutcome, GroupingReport, GroupingState};
pub use ledger::{Ledger, LedgerEntry, LedgerReport, PartyAccount, RegisterReport};
pub use planner::CashExchangePlanner;
pub use replenishment::{ReplenishmentPlan, RollAction, RollCheck, RollMaintainer};
pub use search::CombinationSearch;
pub use step_log::StepLog;

/// 計劃結果狀態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
    /// 全部完成
    Completed,

    /// 調撥完成，但收銀機A的補充中止
    ReplenishmentAborted { reason: String },

    /// 調撥中止（帳本回到初始狀態）
    Aborted { reason: String },
}

impl PlanOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PlanOutcome::Completed)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, PlanOutcome::Aborted { .. })
    }
}

/// 調撥計劃
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePlan {
    /// 執行識別碼
    pub run_id: Uuid,

    /// 計劃日期（由呼叫端提供）
    pub planned_on: Option<NaiveDate>,

    pub outcome: PlanOutcome,

    /// 步驟
    pub steps: Vec<Step>,

    /// 帳本報告
    pub ledger: LedgerReport,

    /// 計算耗時（毫秒）
    pub calculation_time_ms: Option<u64>,
}

impl ExchangePlan {
    /// 需要人工操作的步驟
    pub fn actions(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.requires_action)
    }

    pub fn steps_of(&self, kind: StepKind) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.kind() == kind)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Step> {
        self.steps_of(StepKind::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Step> {
        self.steps_of(StepKind::Error)
    }
}
