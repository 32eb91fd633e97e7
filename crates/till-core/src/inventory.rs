//! 收銀機在高模型

use serde::{Deserialize, Serialize};

use crate::denomination::{DenomCounts, Denomination, MAX_PIECES, ROLL_SIZE};
use crate::{Result, TillError};

/// 收銀機在高（散裝 + 棒金）
///
/// 紙幣只有散裝張數；硬幣另有棒金捲數，一捲固定 [`crate::ROLL_SIZE`] 枚。
/// 所有數量皆為非負整數，棒金只能整捲拆開。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "InventorySnapshot")]
pub struct Inventory {
    /// 散裝數量
    loose: DenomCounts,

    /// 棒金捲數（僅硬幣）
    rolls: DenomCounts,
}

/// 反序列化用的原始快照，建構時檢查紙幣不得有棒金
#[derive(Deserialize)]
struct InventorySnapshot {
    #[serde(default)]
    loose: DenomCounts,
    #[serde(default)]
    rolls: DenomCounts,
}

impl TryFrom<InventorySnapshot> for Inventory {
    type Error = TillError;

    fn try_from(snapshot: InventorySnapshot) -> Result<Self> {
        Inventory::new(snapshot.loose, snapshot.rolls)
    }
}

impl Inventory {
    /// 創建在高
    ///
    /// 棒金只能出現在硬幣；各金種合計枚數不得超過 [`MAX_PIECES`]。
    pub fn new(loose: DenomCounts, rolls: DenomCounts) -> Result<Self> {
        if let Some(note) = rolls.denominations().into_iter().find(|d| d.is_note()) {
            return Err(TillError::RollsOnNote(note));
        }
        for denomination in Denomination::ALL {
            check_pieces(denomination, loose.get(denomination), rolls.get(denomination))?;
        }
        Ok(Self { loose, rolls })
    }

    /// 只有散裝的在高
    pub fn from_loose(loose: DenomCounts) -> Self {
        Self {
            loose,
            rolls: DenomCounts::new(),
        }
    }

    /// 建構器模式：設置散裝數量
    pub fn with_loose(mut self, denomination: Denomination, count: u32) -> Self {
        self.loose.set(denomination, count);
        self
    }

    /// 建構器模式：設置棒金捲數
    pub fn with_rolls(mut self, denomination: Denomination, rolls: u32) -> Result<Self> {
        self.set_rolls(denomination, rolls)?;
        Ok(self)
    }

    pub fn set_rolls(&mut self, denomination: Denomination, rolls: u32) -> Result<()> {
        if denomination.is_note() && rolls > 0 {
            return Err(TillError::RollsOnNote(denomination));
        }
        check_pieces(denomination, self.loose(denomination), rolls)?;
        self.rolls.set(denomination, rolls);
        Ok(())
    }

    pub fn loose(&self, denomination: Denomination) -> u32 {
        self.loose.get(denomination)
    }

    pub fn rolls(&self, denomination: Denomination) -> u32 {
        self.rolls.get(denomination)
    }

    pub fn loose_counts(&self) -> &DenomCounts {
        &self.loose
    }

    pub fn roll_counts(&self) -> &DenomCounts {
        &self.rolls
    }

    /// 可用數量：硬幣 = 散裝 + 棒金 × 枚數，紙幣 = 散裝
    pub fn available(&self, denomination: Denomination) -> u32 {
        let rolled = denomination
            .roll_size()
            .map(|size| self.rolls(denomination).saturating_mul(size))
            .unwrap_or(0);
        self.loose(denomination).saturating_add(rolled)
    }

    /// 各金種可用數量
    pub fn available_counts(&self) -> DenomCounts {
        Denomination::ALL
            .into_iter()
            .map(|d| (d, self.available(d)))
            .collect()
    }

    /// 在高總額
    pub fn total_value(&self) -> u64 {
        self.available_counts().total_value()
    }

    /// 硬幣合計金額（含棒金）
    pub fn coin_total_value(&self) -> u64 {
        Denomination::COINS
            .into_iter()
            .map(|d| u64::from(self.available(d)) * u64::from(d.value()))
            .sum()
    }

    /// 紙幣合計金額
    pub fn note_total_value(&self) -> u64 {
        self.total_value() - self.coin_total_value()
    }

    /// 組成說明，例如 `散裝 12 枚 + 棒金 2 捲 (100 枚)`
    pub fn composition(&self, denomination: Denomination) -> String {
        match denomination.roll_size() {
            Some(size) => {
                let rolls = self.rolls(denomination);
                format!(
                    "散裝 {} 枚 + 棒金 {} 捲 ({} 枚)",
                    self.loose(denomination),
                    rolls,
                    rolls.saturating_mul(size)
                )
            }
            None => format!("{} 張", self.loose(denomination)),
        }
    }

    /// 拆開棒金，整捲轉為散裝
    pub fn break_rolls(&mut self, denomination: Denomination, rolls: u32) -> Result<()> {
        let size = denomination
            .roll_size()
            .ok_or(TillError::RollsOnNote(denomination))?;
        let on_hand = self.rolls(denomination);
        if rolls > on_hand {
            return Err(TillError::InsufficientStock {
                denomination,
                requested: rolls.saturating_mul(size),
                available: on_hand.saturating_mul(size),
            });
        }
        self.rolls.set(denomination, on_hand - rolls);
        self.loose.increase(denomination, rolls.saturating_mul(size));
        Ok(())
    }

    /// 出金
    ///
    /// 先扣散裝；散裝不足時才拆棒金（無條件進位到整捲，多出的枚數回到散裝）。
    /// 返回拆開的棒金捲數。
    pub fn withdraw(&mut self, denomination: Denomination, quantity: u32) -> Result<u32> {
        let available = self.available(denomination);
        if quantity > available {
            return Err(TillError::InsufficientStock {
                denomination,
                requested: quantity,
                available,
            });
        }

        let loose = self.loose(denomination);
        let mut broken = 0;
        if quantity > loose {
            // 可用量已檢查，紙幣走不到這裡
            let size = denomination
                .roll_size()
                .ok_or(TillError::RollsOnNote(denomination))?;
            broken = (quantity - loose).div_ceil(size);
            self.break_rolls(denomination, broken)?;
        }

        self.loose.set(denomination, self.loose(denomination) - quantity);
        Ok(broken)
    }

    /// 多金種出金（全部檢查通過才扣帳）
    ///
    /// 返回各金種拆開的棒金捲數。
    pub fn withdraw_all(&mut self, breakdown: &DenomCounts) -> Result<DenomCounts> {
        for (denomination, quantity) in breakdown.nonzero() {
            let available = self.available(denomination);
            if quantity > available {
                return Err(TillError::InsufficientStock {
                    denomination,
                    requested: quantity,
                    available,
                });
            }
        }

        let mut broken = DenomCounts::new();
        for (denomination, quantity) in breakdown.nonzero() {
            broken.set(denomination, self.withdraw(denomination, quantity)?);
        }
        Ok(broken)
    }

    /// 入金（一律記入散裝）
    pub fn deposit(&mut self, denomination: Denomination, quantity: u32) {
        self.loose.increase(denomination, quantity);
    }

    pub fn deposit_all(&mut self, breakdown: &DenomCounts) {
        for (denomination, quantity) in breakdown.nonzero() {
            self.deposit(denomination, quantity);
        }
    }
}

fn check_pieces(denomination: Denomination, loose: u32, rolls: u32) -> Result<()> {
    let pieces = u64::from(loose) + u64::from(rolls) * u64::from(ROLL_SIZE);
    if pieces > u64::from(MAX_PIECES) {
        return Err(TillError::TooManyPieces {
            denomination,
            pieces,
            limit: MAX_PIECES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn supplier() -> Inventory {
        Inventory::from_loose(
            DenomCounts::new()
                .with(Denomination::Yen5000, 20)
                .with(Denomination::Yen100, 12),
        )
        .with_rolls(Denomination::Yen100, 4)
        .unwrap()
    }

    #[test]
    fn test_available_counts_rolls() {
        let inventory = supplier();

        assert_eq!(inventory.available(Denomination::Yen5000), 20);
        assert_eq!(inventory.available(Denomination::Yen100), 12 + 4 * 50);
        assert_eq!(inventory.coin_total_value(), 212 * 100);
        assert_eq!(inventory.note_total_value(), 100_000);
    }

    #[test]
    fn test_rolls_on_note_rejected() {
        let result = Inventory::new(
            DenomCounts::new(),
            DenomCounts::new().with(Denomination::Yen1000, 1),
        );
        assert!(matches!(result, Err(TillError::RollsOnNote(Denomination::Yen1000))));

        let mut inventory = Inventory::default();
        assert!(inventory.set_rolls(Denomination::Yen5000, 1).is_err());
        // 零捲不算違規
        assert!(inventory.set_rolls(Denomination::Yen5000, 0).is_ok());
    }

    #[rstest]
    // 散裝足夠：不拆棒金
    #[case(10, 0, 2, 4)]
    // 差 1 枚：拆 1 捲，剩餘 49 枚回到散裝
    #[case(13, 1, 49, 3)]
    // 差 51 枚：拆 2 捲
    #[case(63, 2, 49, 2)]
    fn test_withdraw_breaks_rolls(
        #[case] quantity: u32,
        #[case] expected_broken: u32,
        #[case] expected_loose: u32,
        #[case] expected_rolls: u32,
    ) {
        let mut inventory = supplier();
        let before = inventory.available(Denomination::Yen100);

        let broken = inventory.withdraw(Denomination::Yen100, quantity).unwrap();

        assert_eq!(broken, expected_broken);
        assert_eq!(inventory.loose(Denomination::Yen100), expected_loose);
        assert_eq!(inventory.rolls(Denomination::Yen100), expected_rolls);
        assert_eq!(inventory.available(Denomination::Yen100), before - quantity);
    }

    #[test]
    fn test_withdraw_insufficient() {
        let mut inventory = supplier();
        let result = inventory.withdraw(Denomination::Yen5000, 21);
        assert!(matches!(
            result,
            Err(TillError::InsufficientStock {
                requested: 21,
                available: 20,
                ..
            })
        ));
        // 失敗時不應改變在高
        assert_eq!(inventory, supplier());
    }

    #[test]
    fn test_withdraw_all_is_atomic() {
        let mut inventory = supplier();
        let breakdown = DenomCounts::new()
            .with(Denomination::Yen5000, 5)
            .with(Denomination::Yen100, 500);

        assert!(inventory.withdraw_all(&breakdown).is_err());
        assert_eq!(inventory, supplier());
    }

    #[test]
    fn test_deposit_credits_loose() {
        let mut inventory = supplier();
        inventory.deposit(Denomination::Yen100, 50);

        assert_eq!(inventory.loose(Denomination::Yen100), 62);
        assert_eq!(inventory.rolls(Denomination::Yen100), 4);
    }

    #[test]
    fn test_composition() {
        let inventory = supplier();
        assert_eq!(
            inventory.composition(Denomination::Yen100),
            "散裝 12 枚 + 棒金 4 捲 (200 枚)"
        );
        assert_eq!(inventory.composition(Denomination::Yen5000), "20 張");
    }

    #[test]
    fn test_snapshot_json() {
        let json = r#"{"loose": {"10000": 3, "500": 40}, "rolls": {"500": 1}}"#;
        let inventory: Inventory = serde_json::from_str(json).unwrap();
        assert_eq!(inventory.available(Denomination::Yen500), 90);

        let bad = r#"{"loose": {}, "rolls": {"1000": 1}}"#;
        assert!(serde_json::from_str::<Inventory>(bad).is_err());
    }

    #[rstest]
    #[case(MAX_PIECES, 0, true)]
    #[case(MAX_PIECES - ROLL_SIZE, 1, true)]
    #[case(MAX_PIECES - ROLL_SIZE + 1, 1, false)]
    #[case(0, 100_000_000, false)]
    #[case(u32::MAX, u32::MAX, false)]
    fn test_piece_limit(#[case] loose: u32, #[case] rolls: u32, #[case] accepted: bool) {
        let result = Inventory::new(
            DenomCounts::new().with(Denomination::Yen100, loose),
            DenomCounts::new().with(Denomination::Yen100, rolls),
        );
        assert_eq!(result.is_ok(), accepted);
        if !accepted {
            assert!(matches!(
                result,
                Err(TillError::TooManyPieces {
                    denomination: Denomination::Yen100,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_set_rolls_respects_piece_limit() {
        let mut inventory = supplier();
        assert!(inventory.set_rolls(Denomination::Yen100, MAX_PIECES).is_err());
        assert_eq!(inventory.rolls(Denomination::Yen100), 4);
    }
}
