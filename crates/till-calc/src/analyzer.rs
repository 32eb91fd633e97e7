//! 不足/餘裕分析

use till_core::{
    DeficitRecord, DenomCounts, DenomLine, Denomination, Inventory, Policy, SurplusRecord,
};

/// 單一收銀機的分析結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterAnalysis {
    /// 不足金種（面額遞減）
    pub shortages: Vec<DeficitRecord>,

    /// 餘裕金種（面額遞減）
    pub surpluses: Vec<SurplusRecord>,
}

impl RegisterAnalysis {
    pub fn has_shortage(&self) -> bool {
        !self.shortages.is_empty()
    }

    pub fn has_surplus(&self) -> bool {
        !self.surpluses.is_empty()
    }

    /// 不足合計金額
    pub fn total_shortage(&self) -> u64 {
        self.shortages.iter().map(DeficitRecord::value).sum()
    }

    /// 餘裕合計金額
    pub fn total_surplus(&self) -> u64 {
        self.surpluses.iter().map(SurplusRecord::value).sum()
    }

    /// 不足數量表
    pub fn shortage_counts(&self) -> DenomCounts {
        self.shortages
            .iter()
            .map(|r| (r.denomination, r.quantity))
            .collect()
    }

    /// 餘裕金種池（組合搜尋用）
    pub fn surplus_pool(&self) -> DenomCounts {
        self.surpluses
            .iter()
            .map(|r| (r.denomination, r.quantity))
            .collect()
    }

    pub fn shortage_lines(&self) -> Vec<DenomLine> {
        self.shortages
            .iter()
            .map(|r| {
                DenomLine::new(
                    r.denomination,
                    r.quantity,
                    format!("不足 {} 枚（現有 {}: {}）", r.quantity, r.current, r.rationale),
                )
            })
            .collect()
    }

    pub fn surplus_lines(&self) -> Vec<DenomLine> {
        self.surpluses
            .iter()
            .map(|r| {
                DenomLine::new(
                    r.denomination,
                    r.quantity,
                    format!("餘裕 {} 枚（現有 {}: {}）", r.quantity, r.current, r.rationale),
                )
            })
            .collect()
    }
}

/// 不足/餘裕分析器
pub struct Analyzer;

impl Analyzer {
    /// 依政策目標分析在高
    ///
    /// 紙幣以張數比較；硬幣以可用數量（散裝 + 棒金）比較，棒金也算入目標。
    /// 沒有目標的金種（如 10000 圓）全數視為餘裕。
    pub fn analyze(inventory: &Inventory, policy: &Policy) -> RegisterAnalysis {
        let mut analysis = RegisterAnalysis::default();

        for denomination in Denomination::ALL {
            let current = inventory.available(denomination);
            let target = policy.target(denomination);

            if current < target {
                analysis.shortages.push(DeficitRecord {
                    denomination,
                    quantity: target - current,
                    current,
                    rationale: inventory.composition(denomination),
                });
            } else if current > target {
                analysis.surpluses.push(SurplusRecord {
                    denomination,
                    quantity: current - target,
                    current,
                    rationale: inventory.composition(denomination),
                });
            }
        }

        tracing::debug!(
            "分析結果: 不足 {} 種 (¥{})，餘裕 {} 種 (¥{})",
            analysis.shortages.len(),
            analysis.total_shortage(),
            analysis.surpluses.len(),
            analysis.total_surplus()
        );

        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Denomination::*;

    fn stocked_register() -> Inventory {
        let mut loose = DenomCounts::new().with(Yen5000, 10).with(Yen1000, 40);
        for coin in Denomination::COINS {
            loose.set(coin, 50);
        }
        Inventory::from_loose(loose)
    }

    #[test]
    fn test_single_note_shortage() {
        let analysis = Analyzer::analyze(&stocked_register(), &Policy::default());

        assert_eq!(analysis.shortage_counts(), DenomCounts::new().with(Yen5000, 10));
        assert_eq!(analysis.total_shortage(), 50_000);
        assert!(!analysis.has_surplus());
    }

    #[test]
    fn test_rolls_count_toward_target() {
        // 散裝 10 枚 + 棒金 1 捲 = 60 枚 → 餘裕 10 枚
        let inventory = stocked_register()
            .with_loose(Yen100, 10)
            .with_rolls(Yen100, 1)
            .unwrap();
        let analysis = Analyzer::analyze(&inventory, &Policy::default());

        let surplus = &analysis.surpluses[0];
        assert_eq!(surplus.denomination, Yen100);
        assert_eq!(surplus.quantity, 10);
        assert_eq!(surplus.rationale, "散裝 10 枚 + 棒金 1 捲 (50 枚)");
    }

    #[test]
    fn test_untargeted_notes_are_surplus() {
        let inventory = stocked_register().with_loose(Yen10000, 4);
        let analysis = Analyzer::analyze(&inventory, &Policy::default());

        assert_eq!(analysis.surplus_pool(), DenomCounts::new().with(Yen10000, 4));
        assert_eq!(analysis.total_surplus(), 40_000);
    }

    #[test]
    fn test_records_descending() {
        let inventory = stocked_register()
            .with_loose(Yen1000, 30)
            .with_loose(Yen10, 45)
            .with_loose(Yen500, 60)
            .with_loose(Yen10000, 1);
        let analysis = Analyzer::analyze(&inventory, &Policy::default());

        let shortages: Vec<Denomination> =
            analysis.shortages.iter().map(|r| r.denomination).collect();
        let surpluses: Vec<Denomination> =
            analysis.surpluses.iter().map(|r| r.denomination).collect();
        assert_eq!(shortages, vec![Yen5000, Yen1000, Yen10]);
        assert_eq!(surpluses, vec![Yen10000, Yen500]);
        assert_eq!(analysis.total_shortage(), 50_000 + 10_000 + 50);
    }
}
