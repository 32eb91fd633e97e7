//! 統一組合搜尋

use till_core::{Combination, DenomCounts, Denomination, Policy};

/// 找不到紙幣餘裕時的增額單位
const DEFAULT_INCREMENT: u64 = 1_000;

/// 統一組合搜尋
///
/// 從餘裕金種池中找出金額恰好等於目標（或其上調候選）的金種組合：
/// 1. 單一金種整除（大面額優先）
/// 2. 以增額單位上調候選金額，逐一嘗試貪婪分解
/// 3. 最後以原目標金額做一次貪婪分解
#[derive(Debug, Clone, Copy)]
pub struct CombinationSearch {
    max_attempts: usize,
}

impl CombinationSearch {
    pub fn new(max_attempts: usize) -> Self {
        Self { max_attempts }
    }

    pub fn from_policy(policy: &Policy) -> Self {
        Self::new(policy.max_search_attempts)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// 搜尋組合，找不到時返回 `None`
    pub fn find(&self, target: u64, pool: &DenomCounts) -> Option<Combination> {
        if target == 0 {
            return Some(Combination::empty());
        }

        if let Some(combination) = Self::single_denomination(target, pool) {
            tracing::debug!("單一金種組合: {}", combination.breakdown);
            return Some(combination);
        }

        let increment = Self::increment(pool);
        let pool_value = pool.total_value();
        let mut candidate = target.div_ceil(increment) * increment;
        let mut attempts = 0;

        while candidate <= pool_value && attempts < self.max_attempts {
            attempts += 1;
            if let Some(combination) = Self::greedy(candidate, pool) {
                tracing::debug!(
                    "上調組合: 目標 ¥{} → ¥{}（第 {} 次嘗試）",
                    target,
                    candidate,
                    attempts
                );
                return Some(combination);
            }
            candidate += increment;
        }

        tracing::debug!("上調搜尋失敗（{} 次），改以原金額 ¥{} 分解", attempts, target);
        Self::greedy(target, pool)
    }

    /// 單一金種整除且數量足夠（面額遞減，第一個符合者）
    pub fn single_denomination(target: u64, pool: &DenomCounts) -> Option<Combination> {
        pool.nonzero().find_map(|(denomination, available)| {
            let value = u64::from(denomination.value());
            if target % value != 0 {
                return None;
            }
            let needed = u32::try_from(target / value).ok()?;
            (needed <= available).then(|| {
                Combination::from_breakdown(DenomCounts::new().with(denomination, needed))
            })
        })
    }

    /// 增額單位：池中有餘裕的最小紙幣面額
    pub fn increment(pool: &DenomCounts) -> u64 {
        Denomination::NOTES
            .into_iter()
            .rev()
            .find(|d| pool.contains(*d))
            .map(|d| u64::from(d.value()))
            .unwrap_or(DEFAULT_INCREMENT)
    }

    /// 貪婪分解（大面額優先），必須剛好湊齊
    pub fn greedy(target: u64, pool: &DenomCounts) -> Option<Combination> {
        let (breakdown, remaining) = Self::greedy_partial(target, pool);
        (remaining == 0).then(|| Combination::from_breakdown(breakdown))
    }

    /// 貪婪分解，返回取用明細與湊不出的餘額
    pub fn greedy_partial(target: u64, pool: &DenomCounts) -> (DenomCounts, u64) {
        let mut remaining = target;
        let mut breakdown = DenomCounts::new();

        for (denomination, available) in pool.nonzero() {
            let value = u64::from(denomination.value());
            let take = (remaining / value).min(u64::from(available));
            if take > 0 {
                // take ≤ available，必能轉回 u32
                breakdown.set(denomination, take as u32);
                remaining -= take * value;
            }
        }

        (breakdown, remaining)
    }
}

impl Default for CombinationSearch {
    fn default() -> Self {
        Self::from_policy(&Policy::default())
    }
}
