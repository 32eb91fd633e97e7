//! 兌換機轉接

use serde::{Deserialize, Serialize};
use till_core::{DenomCounts, Denomination, Inventory, Party, Policy, Result, TillError};

/// 小額硬幣的合計須為此金額的倍數
const SMALL_COIN_UNIT: u64 = 100;

/// 一次兌換機操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineExchange {
    /// 出資（投入基準紙幣並收取結果）的收銀機
    pub funded_by: Party,

    /// 申請金種（小額硬幣已調整為整捲）
    pub requested: DenomCounts,

    /// 申請金種合計
    pub deposit_basis: u64,

    /// 投入金額（基準紙幣的整數倍）
    pub withdrawal_amount: u64,

    pub base_note: Denomination,

    /// 投入的基準紙幣張數
    pub base_notes: u32,

    /// 找零
    pub change: DenomCounts,
}

impl MachineExchange {
    /// 投入兌換機的紙幣
    pub fn inserted(&self) -> DenomCounts {
        DenomCounts::new().with(self.base_note, self.base_notes)
    }

    /// 兌換機取出的全部現金（申請金種 + 找零）
    pub fn dispensed(&self) -> DenomCounts {
        self.requested + self.change
    }

    pub fn change_amount(&self) -> u64 {
        self.withdrawal_amount - self.deposit_basis
    }
}

/// 兌換機
#[derive(Debug, Clone, Copy)]
pub struct ExchangeMachine {
    base_note: Denomination,
}

impl ExchangeMachine {
    pub fn new(base_note: Denomination) -> Self {
        Self { base_note }
    }

    pub fn from_policy(policy: &Policy) -> Self {
        Self::new(policy.base_note)
    }

    pub fn base_note(&self) -> Denomination {
        self.base_note
    }

    fn base_unit(&self) -> u64 {
        u64::from(self.base_note.value())
    }

    /// 把小額硬幣（100 圓以下）調整為整捲
    ///
    /// 兌換機不出零散枚數。整捲後小額硬幣合計若不是 100 圓的倍數，
    /// 追加一捲 1 圓（沒有申請 1 圓時改為 5 圓）吸收 50 圓的零頭。
    pub fn adjust_to_rolls(group: &DenomCounts) -> DenomCounts {
        let mut adjusted = *group;
        for (denomination, quantity) in group.nonzero().filter(|(d, _)| d.is_small_coin()) {
            if let Some(size) = denomination.roll_size() {
                adjusted.set(denomination, quantity.div_ceil(size) * size);
            }
        }

        let small_total: u64 = adjusted
            .nonzero()
            .filter(|(d, _)| d.is_small_coin())
            .map(|(d, quantity)| u64::from(d.value()) * u64::from(quantity))
            .sum();

        if small_total % SMALL_COIN_UNIT != 0 {
            let pad = [Denomination::Yen1, Denomination::Yen5]
                .into_iter()
                .find(|d| adjusted.contains(*d));
            if let Some(denomination) = pad {
                tracing::debug!(
                    "小額硬幣合計 ¥{} 不是 100 圓倍數，追加 {} 一捲",
                    small_total,
                    denomination
                );
                adjusted.increase(denomination, till_core::ROLL_SIZE);
            }
        }

        adjusted
    }

    /// 投入所需的基準紙幣張數
    pub fn required_base_notes(&self, group: &DenomCounts) -> u32 {
        let basis = Self::adjust_to_rolls(group).total_value();
        let notes = basis.div_ceil(self.base_unit());
        u32::try_from(notes).unwrap_or(u32::MAX)
    }

    /// 規劃兌換
    ///
    /// 申請金種為空時返回 `None`。出資收銀機的基準紙幣不足時返回
    /// [`TillError::InsufficientBaseNotes`]。
    pub fn plan(
        &self,
        funded_by: Party,
        group: &DenomCounts,
        funding: &Inventory,
    ) -> Result<Option<MachineExchange>> {
        if group.is_empty() {
            return Ok(None);
        }

        let requested = Self::adjust_to_rolls(group);
        let deposit_basis = requested.total_value();
        let base_unit = self.base_unit();
        let withdrawal_amount = deposit_basis.div_ceil(base_unit) * base_unit;

        let needed = self.required_base_notes(group);
        let available = funding.available(self.base_note);
        if available < needed {
            return Err(TillError::InsufficientBaseNotes {
                party: funded_by,
                base_note: self.base_note,
                needed,
                available,
            });
        }

        let change = self.make_change(withdrawal_amount - deposit_basis)?;

        tracing::debug!(
            "兌換機（{}）: 申請 ¥{}，投入 {}×{}，找零 {}",
            funded_by,
            deposit_basis,
            self.base_note,
            needed,
            change
        );

        Ok(Some(MachineExchange {
            funded_by,
            requested,
            deposit_basis,
            withdrawal_amount,
            base_note: self.base_note,
            base_notes: needed,
            change,
        }))
    }

    /// 找零：只用低於基準紙幣的金種，大面額優先，不得有餘數
    pub fn make_change(&self, amount: u64) -> Result<DenomCounts> {
        let mut remaining = amount;
        let mut change = DenomCounts::new();

        for denomination in Denomination::ALL {
            if denomination.value() >= self.base_note.value() {
                continue;
            }
            let value = u64::from(denomination.value());
            let count = remaining / value;
            if count > 0 {
                change.set(denomination, u32::try_from(count).unwrap_or(u32::MAX));
                remaining -= count * value;
            }
        }

        if remaining > 0 {
            return Err(TillError::ChangeRemainder(remaining));
        }
        Ok(change)
    }
}

impl Default for ExchangeMachine {
    fn default() -> Self {
        Self::from_policy(&Policy::default())
    }
}
