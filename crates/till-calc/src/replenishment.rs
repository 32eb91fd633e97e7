//! 棒金維護與收銀機A補充（LC）

use serde::{Deserialize, Serialize};
use till_core::{
    format_yen, AllocationGroup, DenomCounts, DenomLine, Denomination, GroupKind, Inventory, Policy,
    ROLL_SIZE,
};

/// 硬幣合計不足時，依序追加棒金的金種
const TOP_UP_ORDER: [Denomination; 2] = [Denomination::Yen500, Denomination::Yen100];

/// 棒金檢查的建議動作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollAction {
    /// 拆開棒金補散裝
    BreakRoll,
    /// 沒有棒金，需要兌換機補充
    NeedsReplenishment,
}

/// 出金後散裝低於下限的金種
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollCheck {
    pub denomination: Denomination,
    pub loose_before: u32,
    pub withdrawn: u32,
    /// 出金後散裝（散裝不足時為負，實際會自動拆棒金）
    pub loose_after: i64,
    pub rolls_on_hand: u32,
    pub action: RollAction,
}

impl RollCheck {
    pub fn line(&self) -> DenomLine {
        let tail = match self.action {
            RollAction::BreakRoll => format!("拆開棒金（現有 {} 捲）", self.rolls_on_hand),
            RollAction::NeedsReplenishment => "無棒金".to_string(),
        };
        DenomLine::new(
            self.denomination,
            self.withdrawn,
            format!(
                "散裝 {} 枚 → 出金 {} 枚 → 剩 {} 枚（{}）",
                self.loose_before, self.withdrawn, self.loose_after, tail
            ),
        )
    }
}

/// 棒金超過保管上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeilingWarning {
    pub denomination: Denomination,
    pub current_rolls: u32,
    pub added_rolls: u32,
    pub ceiling: u32,
}

impl CeilingWarning {
    pub fn line(&self) -> DenomLine {
        DenomLine::new(
            self.denomination,
            self.added_rolls * ROLL_SIZE,
            format!(
                "現有 {} 捲 + 追加 {} 捲 = {} 捲 > 上限 {} 捲",
                self.current_rolls,
                self.added_rolls,
                self.current_rolls + self.added_rolls,
                self.ceiling
            ),
        )
    }
}

/// 收銀機A的補充計劃
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentPlan {
    /// LC（枚數；硬幣一律為整捲）
    pub group: AllocationGroup,

    /// 補充前硬幣合計
    pub coin_total_before: u64,

    /// 補充後預計硬幣合計
    pub coin_total_after: u64,

    pub coin_total_target: u64,

    pub ceiling_warnings: Vec<CeilingWarning>,
}

impl ReplenishmentPlan {
    pub fn is_empty(&self) -> bool {
        self.group.is_empty()
    }

    pub fn total_value(&self) -> u64 {
        self.group.total_value()
    }

    /// 硬幣合計仍未達目標的差額
    pub fn shortfall(&self) -> Option<u64> {
        let gap = self.coin_total_target.saturating_sub(self.coin_total_after);
        (gap > 0).then_some(gap)
    }

    /// LC 說明列
    pub fn lines(&self, supplier: &Inventory) -> Vec<DenomLine> {
        self.group
            .counts
            .nonzero()
            .map(|(denomination, quantity)| {
                let remark = if denomination.is_note() {
                    format!(
                        "現有 {} 張 → 補充 {} 張",
                        supplier.available(denomination),
                        quantity
                    )
                } else {
                    format!(
                        "棒金 {} 捲 → 補充 {} 捲",
                        supplier.rolls(denomination),
                        quantity / ROLL_SIZE
                    )
                };
                DenomLine::new(denomination, quantity, remark)
            })
            .collect()
    }
}

/// 棒金維護器
pub struct RollMaintainer<'a> {
    policy: &'a Policy,
}

impl<'a> RollMaintainer<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self { policy }
    }

    /// 檢查出金後散裝是否低於下限（所有硬幣金種）
    ///
    /// `supplier` 是出金前的在高；結果只是建議，不會改動在高。
    pub fn check_rolls(&self, supplier: &Inventory, withdrawal: &DenomCounts) -> Vec<RollCheck> {
        let floor = i64::from(self.policy.min_loose_floor);

        Denomination::COINS
            .into_iter()
            .filter_map(|denomination| {
                let loose_before = supplier.loose(denomination);
                let withdrawn = withdrawal.get(denomination);
                let loose_after = i64::from(loose_before) - i64::from(withdrawn);
                if loose_after >= floor {
                    return None;
                }

                let rolls_on_hand = supplier.rolls(denomination);
                let action = if rolls_on_hand > 0 {
                    RollAction::BreakRoll
                } else {
                    RollAction::NeedsReplenishment
                };
                Some(RollCheck {
                    denomination,
                    loose_before,
                    withdrawn,
                    loose_after,
                    rolls_on_hand,
                    action,
                })
            })
            .collect()
    }

    /// 只檢查本次實際出金的硬幣
    pub fn check_withdrawal(
        &self,
        supplier: &Inventory,
        withdrawal: &DenomCounts,
    ) -> Vec<RollCheck> {
        self.check_rolls(supplier, withdrawal)
            .into_iter()
            .filter(|check| check.withdrawn > 0)
            .collect()
    }

    /// 計算收銀機A自身的補充需求（LC）
    ///
    /// 1. 紙幣補到補充目標（可覆寫）；基準紙幣不列入
    /// 2. 棒金捲數在門檻以下的硬幣補到目標捲數
    /// 3. 5 圓與 1 圓的捲數合計須為偶數，否則追加 1 圓一捲
    /// 4. 硬幣合計未達目標時，在上限內追加 500 圓、100 圓棒金
    pub fn plan(&self, supplier: &Inventory) -> ReplenishmentPlan {
        let policy = self.policy;
        let mut counts = DenomCounts::new();

        for note in Denomination::NOTES {
            if note == policy.base_note {
                continue;
            }
            let target = policy.replenishment_target(note);
            let current = supplier.available(note);
            if current < target {
                counts.set(note, target - current);
            }
        }

        let mut rolls = DenomCounts::new();
        for coin in Denomination::COINS {
            let on_hand = supplier.rolls(coin);
            let refill_to = policy.roll_refill_target.get(coin);
            if on_hand <= policy.roll_refill_threshold.get(coin) && refill_to > on_hand {
                rolls.set(coin, refill_to - on_hand);
            }
        }

        // 5 圓一捲 250 圓、1 圓一捲 50 圓：合計捲數為奇數時會留下 50 圓零頭
        if (rolls.get(Denomination::Yen5) + rolls.get(Denomination::Yen1)) % 2 == 1 {
            rolls.increase(Denomination::Yen1, 1);
        }

        let coin_total_before = supplier.coin_total_value();
        let mut projected = coin_total_before + rolled_value(&rolls);

        for denomination in TOP_UP_ORDER {
            if projected >= policy.coin_total_target {
                break;
            }
            let Some(roll_value) = denomination.roll_value() else {
                continue;
            };
            let ceiling = policy.effective_roll_ceiling(denomination, supplier.loose(denomination));
            let held = supplier.rolls(denomination) + rolls.get(denomination);
            if held >= ceiling {
                continue;
            }

            let needed = (policy.coin_total_target - projected).div_ceil(roll_value);
            let add = u32::try_from(needed).unwrap_or(u32::MAX).min(ceiling - held);
            rolls.increase(denomination, add);
            projected += u64::from(add) * roll_value;
        }

        let ceiling_warnings: Vec<CeilingWarning> = rolls
            .nonzero()
            .filter_map(|(denomination, added_rolls)| {
                let current_rolls = supplier.rolls(denomination);
                let ceiling =
                    policy.effective_roll_ceiling(denomination, supplier.loose(denomination));
                (current_rolls + added_rolls > ceiling).then_some(CeilingWarning {
                    denomination,
                    current_rolls,
                    added_rolls,
                    ceiling,
                })
            })
            .collect();

        for (coin, count) in rolls.nonzero() {
            counts.set(coin, count * ROLL_SIZE);
        }

        let plan = ReplenishmentPlan {
            group: AllocationGroup::new(GroupKind::Lc).with_counts(counts),
            coin_total_before,
            coin_total_after: projected,
            coin_total_target: policy.coin_total_target,
            ceiling_warnings,
        };

        tracing::debug!(
            "LC: {}（硬幣合計 {} → {}，目標 {}）",
            plan.group.counts,
            format_yen(plan.coin_total_before),
            format_yen(plan.coin_total_after),
            format_yen(plan.coin_total_target)
        );

        plan
    }
}

fn rolled_value(rolls: &DenomCounts) -> u64 {
    rolls
        .nonzero()
        .filter_map(|(d, count)| d.roll_value().map(|value| value * u64::from(count)))
        .sum()
}
