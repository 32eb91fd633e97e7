//! 步驟記錄器

use till_core::{DenomCounts, DenomLine, Party, Step, StepAction};

use crate::exchange::MachineExchange;

/// 步驟記錄器
///
/// 單一擁有者的累積器，由計劃器以 `&mut` 傳給各階段。
/// 序號一律由位置決定（第 n 筆為 n），回溯後序號仍連續。
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    steps: Vec<Step>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加步驟，返回序號
    pub fn push(
        &mut self,
        action: StepAction,
        total: Option<u64>,
        rationale: impl Into<String>,
        requires_action: bool,
    ) -> usize {
        let ordinal = self.steps.len() + 1;
        self.steps.push(Step {
            ordinal,
            action,
            total,
            rationale: rationale.into(),
            requires_action,
        });
        ordinal
    }

    pub fn info(
        &mut self,
        title: impl Into<String>,
        lines: Vec<DenomLine>,
        total: Option<u64>,
        rationale: impl Into<String>,
    ) -> usize {
        let action = StepAction::Info {
            title: title.into(),
            lines,
        };
        self.push(action, total, rationale, false)
    }

    /// 現金移動（需人工操作）
    pub fn transfer(
        &mut self,
        from: Party,
        to: Party,
        breakdown: DenomCounts,
        rationale: impl Into<String>,
    ) -> usize {
        let total = breakdown.total_value();
        let action = StepAction::Transfer {
            from,
            to,
            breakdown,
        };
        self.push(action, Some(total), rationale, true)
    }

    pub fn machine_exchange(&mut self, exchange: &MachineExchange) -> usize {
        let action = StepAction::MachineExchange {
            register: exchange.funded_by,
            inserted: exchange.inserted(),
            dispensed: exchange.dispensed(),
            deposit_basis: exchange.deposit_basis,
            change: exchange.change,
        };
        let rationale = format!(
            "申請金種 {} + 找零 {}",
            till_core::format_yen(exchange.deposit_basis),
            till_core::format_yen(exchange.change_amount())
        );
        self.push(action, Some(exchange.withdrawal_amount), rationale, true)
    }

    pub fn warning(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        lines: Vec<DenomLine>,
    ) -> usize {
        let action = StepAction::Warning {
            title: title.into(),
            message: message.into(),
            lines,
        };
        self.push(action, None, String::new(), false)
    }

    pub fn error(&mut self, message: impl Into<String>) -> usize {
        let action = StepAction::Error {
            message: message.into(),
        };
        self.push(action, None, String::new(), false)
    }

    /// 目前位置，供 [`StepLog::truncate`] 回溯
    pub fn mark(&self) -> usize {
        self.steps.len()
    }

    /// 回溯到指定位置（捨棄之後的步驟）
    pub fn truncate(&mut self, mark: usize) {
        self.steps.truncate(mark);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.steps.iter().any(Step::is_error)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}
