//! 調撥政策配置

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::denomination::{DenomCounts, Denomination, DenominationKind, MAX_PIECES, ROLL_SIZE};
use crate::{Result, TillError};

/// 棒金上限例外規則
///
/// 指定金種的散裝數量低於門檻時，該金種的棒金上限加一。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollCeilingException {
    /// 適用金種
    pub denomination: Denomination,

    /// 散裝低於此數時放寬上限
    pub loose_below: u32,
}

/// 調撥政策
///
/// 所有欄位都有預設值；JSON 只需列出要覆寫的項目。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// 各金種目標數量（收銀機B補足基準；10000 圓無目標）
    pub target_count: DenomCounts,

    /// 紙幣最低保有張數（內部調撥不得低於此數）
    pub min_holdback: DenomCounts,

    /// 散裝硬幣下限（低於此數需拆棒金或補充）
    pub min_loose_floor: u32,

    /// 各硬幣棒金上限（捲）
    pub roll_ceiling: DenomCounts,

    /// 兌換機基準紙幣
    pub base_note: Denomination,

    /// 紙幣不足一律由兌換機處理
    pub force_machine_for_notes: bool,

    /// 收銀機A紙幣補充目標
    pub replenishment_note_target: DenomCounts,

    /// 收銀機A紙幣補充目標覆寫
    pub replenishment_target_override: BTreeMap<Denomination, u32>,

    /// 棒金補充門檻：捲數小於等於此值時補充
    pub roll_refill_threshold: DenomCounts,

    /// 棒金補充後的目標捲數
    pub roll_refill_target: DenomCounts,

    /// 收銀機A硬幣合計目標金額
    pub coin_total_target: u64,

    /// 棒金上限例外
    pub roll_ceiling_exception: Option<RollCeilingException>,

    /// LA/LB 分組最大反覆次數
    pub max_grouping_iterations: usize,

    /// 組合搜尋最大嘗試次數
    pub max_search_attempts: usize,
}

impl Default for Policy {
    fn default() -> Self {
        use Denomination::*;

        let mut target_count = DenomCounts::new()
            .with(Yen5000, 20)
            .with(Yen1000, 40);
        for coin in Denomination::COINS {
            target_count.set(coin, 50);
        }

        Self {
            target_count,
            min_holdback: DenomCounts::new().with(Yen5000, 5).with(Yen1000, 10),
            min_loose_floor: 20,
            roll_ceiling: DenomCounts::new()
                .with(Yen500, 2)
                .with(Yen100, 5)
                .with(Yen50, 2)
                .with(Yen10, 5)
                .with(Yen5, 2)
                .with(Yen1, 5),
            base_note: Yen10000,
            force_machine_for_notes: false,
            replenishment_note_target: DenomCounts::new().with(Yen5000, 30).with(Yen1000, 60),
            replenishment_target_override: BTreeMap::new(),
            roll_refill_threshold: DenomCounts::new()
                .with(Yen100, 1)
                .with(Yen10, 1)
                .with(Yen1, 1),
            roll_refill_target: DenomCounts::new()
                .with(Yen500, 1)
                .with(Yen100, 2)
                .with(Yen50, 1)
                .with(Yen10, 2)
                .with(Yen5, 1)
                .with(Yen1, 2),
            coin_total_target: 90_000,
            roll_ceiling_exception: Some(RollCeilingException {
                denomination: Yen500,
                loose_below: 10,
            }),
            max_grouping_iterations: 10,
            max_search_attempts: 100,
        }
    }
}

impl Policy {
    /// 從 JSON 讀取（未列出的欄位使用預設值）
    pub fn from_json_str(json: &str) -> Result<Self> {
        let policy: Policy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    /// 建構器模式：設置目標數量
    pub fn with_target(mut self, denomination: Denomination, count: u32) -> Self {
        self.target_count.set(denomination, count);
        self
    }

    /// 建構器模式：設置紙幣最低保有張數
    pub fn with_min_holdback(mut self, denomination: Denomination, count: u32) -> Self {
        self.min_holdback.set(denomination, count);
        self
    }

    /// 建構器模式：設置散裝硬幣下限
    pub fn with_min_loose_floor(mut self, floor: u32) -> Self {
        self.min_loose_floor = floor;
        self
    }

    /// 建構器模式：設置棒金上限
    pub fn with_roll_ceiling(mut self, denomination: Denomination, rolls: u32) -> Self {
        self.roll_ceiling.set(denomination, rolls);
        self
    }

    /// 建構器模式：設置基準紙幣
    pub fn with_base_note(mut self, denomination: Denomination) -> Self {
        self.base_note = denomination;
        self
    }

    /// 建構器模式：紙幣不足是否一律使用兌換機
    pub fn with_force_machine_for_notes(mut self, force: bool) -> Self {
        self.force_machine_for_notes = force;
        self
    }

    /// 建構器模式：覆寫收銀機A的紙幣補充目標
    pub fn with_replenishment_override(mut self, denomination: Denomination, count: u32) -> Self {
        self.replenishment_target_override.insert(denomination, count);
        self
    }

    /// 建構器模式：設置硬幣合計目標金額
    pub fn with_coin_total_target(mut self, amount: u64) -> Self {
        self.coin_total_target = amount;
        self
    }

    /// 建構器模式：設置棒金上限例外（`None` 表示停用）
    pub fn with_roll_ceiling_exception(mut self, exception: Option<RollCeilingException>) -> Self {
        self.roll_ceiling_exception = exception;
        self
    }

    /// 建構器模式：設置棒金補充門檻與目標
    pub fn with_roll_refill(
        mut self,
        denomination: Denomination,
        threshold: u32,
        target: u32,
    ) -> Self {
        self.roll_refill_threshold.set(denomination, threshold);
        self.roll_refill_target.set(denomination, target);
        self
    }

    pub fn target(&self, denomination: Denomination) -> u32 {
        self.target_count.get(denomination)
    }

    pub fn holdback(&self, denomination: Denomination) -> u32 {
        self.min_holdback.get(denomination)
    }

    /// 基準紙幣面額
    pub fn base_unit(&self) -> u64 {
        u64::from(self.base_note.value())
    }

    /// 收銀機A紙幣補充目標（覆寫優先）
    pub fn replenishment_target(&self, denomination: Denomination) -> u32 {
        self.replenishment_target_override
            .get(&denomination)
            .copied()
            .unwrap_or_else(|| self.replenishment_note_target.get(denomination))
    }

    /// 實際棒金上限（套用例外規則）
    pub fn effective_roll_ceiling(&self, denomination: Denomination, loose: u32) -> u32 {
        let ceiling = self.roll_ceiling.get(denomination);
        match self.roll_ceiling_exception {
            Some(exception)
                if exception.denomination == denomination && loose < exception.loose_below =>
            {
                ceiling + 1
            }
            _ => ceiling,
        }
    }

    /// 檢查配置一致性
    pub fn validate(&self) -> Result<()> {
        if !self.base_note.is_note() {
            return Err(TillError::InvalidPolicy(format!(
                "基準紙幣必須是紙幣: {}",
                self.base_note
            )));
        }
        if self.max_grouping_iterations == 0 || self.max_search_attempts == 0 {
            return Err(TillError::InvalidPolicy("反覆次數上限必須大於 0".to_string()));
        }

        let coin_only = [
            ("roll_ceiling", &self.roll_ceiling),
            ("roll_refill_threshold", &self.roll_refill_threshold),
            ("roll_refill_target", &self.roll_refill_target),
        ];
        for (name, counts) in coin_only {
            if !counts.filter_kind(DenominationKind::Note).is_empty() {
                return Err(TillError::InvalidPolicy(format!("{} 只能設定硬幣", name)));
            }
        }

        let note_only = [
            ("min_holdback", &self.min_holdback),
            ("replenishment_note_target", &self.replenishment_note_target),
        ];
        for (name, counts) in note_only {
            if !counts.filter_kind(DenominationKind::Coin).is_empty() {
                return Err(TillError::InvalidPolicy(format!("{} 只能設定紙幣", name)));
            }
        }

        if let Some(coin) = self
            .replenishment_target_override
            .keys()
            .find(|d| d.is_coin())
        {
            return Err(TillError::InvalidPolicy(format!(
                "補充目標覆寫只能設定紙幣: {}",
                coin
            )));
        }

        let bounded = [
            ("target_count", self.target_count.iter().map(|(_, n)| u64::from(n)).max()),
            (
                "replenishment_note_target",
                self.replenishment_note_target.iter().map(|(_, n)| u64::from(n)).max(),
            ),
            (
                "replenishment_target_override",
                self.replenishment_target_override.values().map(|n| u64::from(*n)).max(),
            ),
            (
                "roll_refill_target",
                self.roll_refill_target
                    .iter()
                    .map(|(_, rolls)| u64::from(rolls) * u64::from(ROLL_SIZE))
                    .max(),
            ),
        ];
        for (name, largest) in bounded {
            if largest.unwrap_or(0) > u64::from(MAX_PIECES) {
                return Err(TillError::InvalidPolicy(format!(
                    "{} 超過單一金種上限 {} 枚",
                    name, MAX_PIECES
                )));
            }
        }

        if let Some(exception) = self.roll_ceiling_exception {
            if exception.denomination.is_note() {
                return Err(TillError::InvalidPolicy(format!(
                    "棒金上限例外只能設定硬幣: {}",
                    exception.denomination
                )));
            }
        }

        for coin in Denomination::COINS {
            if self.roll_refill_target.get(coin) < self.roll_refill_threshold.get(coin) {
                return Err(TillError::InvalidPolicy(format!(
                    "{} 的棒金補充目標低於補充門檻",
                    coin
                )));
            }
        }

        Ok(())
    }
}
