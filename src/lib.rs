//! # Till
//!
//! 兩台收銀機與兌換機之間的現金調撥計劃
//!
//! ```no_run
//! let json = std::fs::read_to_string("request.json").unwrap();
//! let plan = till::plan_from_json(&json).unwrap();
//! for step in &plan.steps {
//!     println!("{}", step);
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use till_calc::*;
pub use till_core::*;

/// 計劃請求（外部輸入的 JSON 文件）
///
/// `policy` 可省略或只列出要覆寫的欄位。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub policy: Policy,

    /// 供應側收銀機（持有棒金）
    pub register_a: Inventory,

    /// 補足對象收銀機
    pub register_b: Inventory,

    #[serde(default)]
    pub planned_on: Option<NaiveDate>,
}

impl PlanRequest {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let request: PlanRequest = serde_json::from_str(json)?;
        request.policy.validate()?;
        Ok(request)
    }

    /// 執行計劃
    pub fn plan(&self) -> Result<ExchangePlan> {
        let planner = CashExchangePlanner::new(self.policy.clone())?;
        Ok(planner.plan(&self.register_a, &self.register_b, self.planned_on))
    }
}

/// 從 JSON 請求直接產生計劃
pub fn plan_from_json(json: &str) -> Result<ExchangePlan> {
    PlanRequest::from_json_str(json)?.plan()
}
