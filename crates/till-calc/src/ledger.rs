//! 交易帳本

use serde::{Deserialize, Serialize};
use till_core::{DenomCounts, Denomination, Inventory, Party, Result};

/// 單一對象的累計出入金
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyAccount {
    pub withdrawn: DenomCounts,
    pub deposited: DenomCounts,
}

impl PartyAccount {
    pub fn withdrawn_value(&self) -> u64 {
        self.withdrawn.total_value()
    }

    pub fn deposited_value(&self) -> u64 {
        self.deposited.total_value()
    }

    /// 出金合計 − 入金合計
    pub fn net_difference(&self) -> i64 {
        signed(self.withdrawn_value()) - signed(self.deposited_value())
    }
}

/// 帳本記錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// 序號（從 1 開始）
    pub sequence: usize,
    pub from: Party,
    pub to: Party,
    pub breakdown: DenomCounts,
    pub amount: u64,
    /// 出金時拆開的棒金捲數
    pub rolls_broken: DenomCounts,
}

/// 交易帳本
///
/// 每筆移動立即套用到兩台收銀機的在高（兌換機視為無限庫存），
/// 同時累計各對象的出入金。回溯時整個帳本以 `clone` 還原。
#[derive(Debug, Clone)]
pub struct Ledger {
    initial: [Inventory; 2],
    registers: [Inventory; 2],
    accounts: [PartyAccount; 3],
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new(register_a: Inventory, register_b: Inventory) -> Self {
        let initial = [register_a, register_b];
        Self {
            registers: initial.clone(),
            initial,
            accounts: [PartyAccount::default(); 3],
            entries: Vec::new(),
        }
    }

    /// 收銀機的目前在高；兌換機返回 `None`
    pub fn inventory(&self, party: Party) -> Option<&Inventory> {
        party.is_register().then(|| &self.registers[party.index()])
    }

    pub fn initial_inventory(&self, party: Party) -> Option<&Inventory> {
        party.is_register().then(|| &self.initial[party.index()])
    }

    pub fn register_a(&self) -> &Inventory {
        &self.registers[Party::RegisterA.index()]
    }

    pub fn register_b(&self) -> &Inventory {
        &self.registers[Party::RegisterB.index()]
    }

    pub fn account(&self, party: Party) -> &PartyAccount {
        &self.accounts[party.index()]
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// 記錄並套用一筆移動
    ///
    /// 出金方庫存不足時返回錯誤，帳本不變。
    pub fn transfer(
        &mut self,
        from: Party,
        to: Party,
        breakdown: &DenomCounts,
    ) -> Result<&LedgerEntry> {
        let rolls_broken = Self::apply(&mut self.registers, from, to, breakdown)?;

        self.accounts[from.index()].withdrawn += *breakdown;
        self.accounts[to.index()].deposited += *breakdown;

        let entry = LedgerEntry {
            sequence: self.entries.len() + 1,
            from,
            to,
            breakdown: *breakdown,
            amount: breakdown.total_value(),
            rolls_broken,
        };
        tracing::debug!("帳本 #{}: {} → {} {}", entry.sequence, from, to, breakdown);
        self.entries.push(entry);

        Ok(&self.entries[self.entries.len() - 1])
    }

    fn apply(
        registers: &mut [Inventory; 2],
        from: Party,
        to: Party,
        breakdown: &DenomCounts,
    ) -> Result<DenomCounts> {
        let rolls_broken = if from.is_register() {
            registers[from.index()].withdraw_all(breakdown)?
        } else {
            DenomCounts::new()
        };
        if to.is_register() {
            registers[to.index()].deposit_all(breakdown);
        }
        Ok(rolls_broken)
    }

    /// 從初始在高重新套用全部記錄
    pub fn replay(&self) -> Result<[Inventory; 2]> {
        let mut registers = self.initial.clone();
        for entry in &self.entries {
            Self::apply(&mut registers, entry.from, entry.to, &entry.breakdown)?;
        }
        Ok(registers)
    }

    /// 產生對帳報告
    pub fn report(&self) -> LedgerReport {
        let replayed = self.replay().ok();

        let registers: Vec<RegisterReport> = [Party::RegisterA, Party::RegisterB]
            .into_iter()
            .map(|party| {
                let index = party.index();
                let initial = &self.initial[index];
                let final_inventory = &self.registers[index];
                let account = self.accounts[index];

                let formula_holds = Denomination::ALL.into_iter().all(|d| {
                    i64::from(initial.available(d)) + i64::from(account.deposited.get(d))
                        - i64::from(account.withdrawn.get(d))
                        == i64::from(final_inventory.available(d))
                });
                let replay_matches = replayed
                    .as_ref()
                    .is_some_and(|registers| &registers[index] == final_inventory);

                RegisterReport {
                    party,
                    initial: initial.clone(),
                    final_inventory: final_inventory.clone(),
                    withdrawn: account.withdrawn,
                    deposited: account.deposited,
                    withdrawn_value: account.withdrawn_value(),
                    deposited_value: account.deposited_value(),
                    net_difference: account.net_difference(),
                    reconciled: formula_holds && replay_matches,
                }
            })
            .collect();

        let machine = self.accounts[Party::Machine.index()];
        let balanced = registers
            .iter()
            .all(|r| r.reconciled && r.net_difference == 0)
            && machine.net_difference() == 0;

        LedgerReport {
            registers,
            machine,
            entries: self.entries.clone(),
            balanced,
        }
    }
}

/// 單台收銀機的對帳結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterReport {
    pub party: Party,
    pub initial: Inventory,
    pub final_inventory: Inventory,
    pub withdrawn: DenomCounts,
    pub deposited: DenomCounts,
    pub withdrawn_value: u64,
    pub deposited_value: u64,
    pub net_difference: i64,

    /// 最終在高 = 初始 + 入金 − 出金，且與重新套用的結果一致
    pub reconciled: bool,
}

/// 帳本報告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub registers: Vec<RegisterReport>,
    pub machine: PartyAccount,
    pub entries: Vec<LedgerEntry>,

    /// 全部收銀機已對帳且出入金淨差為零
    pub balanced: bool,
}

impl LedgerReport {
    pub fn register(&self, party: Party) -> Option<&RegisterReport> {
        self.registers.iter().find(|r| r.party == party)
    }
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
