//! 金種定義表
//!
//! 以固定順序（面額由大到小）的列舉表示所有紙幣與硬幣，
//! 避免以數值字面量做分支判斷。

use serde::de::{self, MapAccess, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};

use crate::TillError;

/// 棒金一捲的枚數
pub const ROLL_SIZE: u32 = 50;

/// 單一金種可持有的最大枚數（散裝 + 棒金）
pub const MAX_PIECES: u32 = 100_000_000;

/// 金種類別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominationKind {
    /// 紙幣
    Note,
    /// 硬幣
    Coin,
}

/// 金種
///
/// 宣告順序即為處理順序（面額遞減），`index()` 直接對應 [`DenomCounts`] 的位置。
/// JSON 以面額數值表示；作為物件鍵時是字串（`"5000"`），兩種寫法都接受。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u32")]
pub enum Denomination {
    Yen10000,
    Yen5000,
    Yen1000,
    Yen500,
    Yen100,
    Yen50,
    Yen10,
    Yen5,
    Yen1,
}

impl Denomination {
    /// 金種數量
    pub const COUNT: usize = 9;

    /// 全部金種（面額遞減）
    pub const ALL: [Denomination; Self::COUNT] = [
        Denomination::Yen10000,
        Denomination::Yen5000,
        Denomination::Yen1000,
        Denomination::Yen500,
        Denomination::Yen100,
        Denomination::Yen50,
        Denomination::Yen10,
        Denomination::Yen5,
        Denomination::Yen1,
    ];

    /// 紙幣（面額遞減）
    pub const NOTES: [Denomination; 3] = [
        Denomination::Yen10000,
        Denomination::Yen5000,
        Denomination::Yen1000,
    ];

    /// 硬幣（面額遞減）
    pub const COINS: [Denomination; 6] = [
        Denomination::Yen500,
        Denomination::Yen100,
        Denomination::Yen50,
        Denomination::Yen10,
        Denomination::Yen5,
        Denomination::Yen1,
    ];

    /// 面額
    pub const fn value(self) -> u32 {
        match self {
            Denomination::Yen10000 => 10000,
            Denomination::Yen5000 => 5000,
            Denomination::Yen1000 => 1000,
            Denomination::Yen500 => 500,
            Denomination::Yen100 => 100,
            Denomination::Yen50 => 50,
            Denomination::Yen10 => 10,
            Denomination::Yen5 => 5,
            Denomination::Yen1 => 1,
        }
    }

    /// 在金種表中的位置
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn kind(self) -> DenominationKind {
        match self {
            Denomination::Yen10000 | Denomination::Yen5000 | Denomination::Yen1000 => {
                DenominationKind::Note
            }
            _ => DenominationKind::Coin,
        }
    }

    pub fn is_note(self) -> bool {
        self.kind() == DenominationKind::Note
    }

    pub fn is_coin(self) -> bool {
        self.kind() == DenominationKind::Coin
    }

    /// 棒金枚數（紙幣沒有棒金）
    pub fn roll_size(self) -> Option<u32> {
        self.is_coin().then_some(ROLL_SIZE)
    }

    /// 棒金一捲的金額
    pub fn roll_value(self) -> Option<u64> {
        self.roll_size()
            .map(|size| u64::from(size) * u64::from(self.value()))
    }

    /// 低於 100 的小額硬幣（向兌換機申請時必須以整捲計）
    pub fn is_small_coin(self) -> bool {
        self.is_coin() && self.value() < 100
    }

    /// 由面額取得金種
    pub fn from_value(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.value() == value)
    }
}

impl TryFrom<u32> for Denomination {
    type Error = TillError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or(TillError::InvalidDenomination(value))
    }
}

struct DenominationVisitor;

impl<'de> Visitor<'de> for DenominationVisitor {
    type Value = Denomination;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a denomination value such as 5000 or \"5000\"")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Denomination, E> {
        u32::try_from(value)
            .ok()
            .and_then(Denomination::from_value)
            .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(value), &self))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Denomination, E> {
        u64::try_from(value)
            .map_err(|_| E::invalid_value(Unexpected::Signed(value), &self))
            .and_then(|value| self.visit_u64(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Denomination, E> {
        value
            .trim()
            .parse::<u64>()
            .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
            .and_then(|parsed| self.visit_u64(parsed))
    }
}

impl<'de> Deserialize<'de> for Denomination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DenominationVisitor)
    }
}

impl From<Denomination> for u32 {
    fn from(denomination: Denomination) -> Self {
        denomination.value()
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_yen(u64::from(self.value())))
    }
}

/// 以千分位格式化金額，例如 `¥83,250`
pub fn format_yen(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("¥{}", grouped)
}

/// 各金種數量表
///
/// 以金種位置索引的固定陣列；迭代一律依面額遞減，結果不受雜湊順序影響。
/// JSON 表示為以面額為鍵的物件（只輸出非零項），例如 `{"5000": 10}`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "BTreeMap<u32, u32>")]
pub struct DenomCounts([u32; Denomination::COUNT]);

impl DenomCounts {
    /// 創建空的數量表
    pub const fn new() -> Self {
        Self([0; Denomination::COUNT])
    }

    /// 建構器模式：設置單一金種數量
    pub fn with(mut self, denomination: Denomination, count: u32) -> Self {
        self.set(denomination, count);
        self
    }

    pub fn get(&self, denomination: Denomination) -> u32 {
        self.0[denomination.index()]
    }

    pub fn set(&mut self, denomination: Denomination, count: u32) {
        self.0[denomination.index()] = count;
    }

    /// 累加數量（達 `u32::MAX` 時飽和）
    pub fn increase(&mut self, denomination: Denomination, count: u32) {
        let slot = &mut self.0[denomination.index()];
        *slot = slot.saturating_add(count);
    }

    /// 取出並歸零
    pub fn take(&mut self, denomination: Denomination) -> u32 {
        std::mem::take(&mut self.0[denomination.index()])
    }

    pub fn contains(&self, denomination: Denomination) -> bool {
        self.get(denomination) > 0
    }

    /// 依面額遞減迭代（含零）
    pub fn iter(&self) -> impl Iterator<Item = (Denomination, u32)> + '_ {
        Denomination::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    /// 依面額遞減迭代非零項
    pub fn nonzero(&self) -> impl Iterator<Item = (Denomination, u32)> + '_ {
        self.iter().filter(|(_, count)| *count > 0)
    }

    /// 非零金種清單
    pub fn denominations(&self) -> Vec<Denomination> {
        self.nonzero().map(|(d, _)| d).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|count| *count == 0)
    }

    /// 合計金額
    pub fn total_value(&self) -> u64 {
        self.iter()
            .map(|(d, count)| u64::from(d.value()) * u64::from(count))
            .sum()
    }

    /// 合計枚數
    pub fn pieces(&self) -> u64 {
        self.0.iter().map(|count| u64::from(*count)).sum()
    }

    /// 只保留指定類別的金種
    pub fn filter_kind(&self, kind: DenominationKind) -> Self {
        self.nonzero().filter(|(d, _)| d.kind() == kind).collect()
    }
}

impl FromIterator<(Denomination, u32)> for DenomCounts {
    fn from_iter<I: IntoIterator<Item = (Denomination, u32)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (denomination, count) in iter {
            counts.increase(denomination, count);
        }
        counts
    }
}

impl Add for DenomCounts {
    type Output = DenomCounts;

    fn add(mut self, rhs: DenomCounts) -> DenomCounts {
        self += rhs;
        self
    }
}

impl AddAssign for DenomCounts {
    fn add_assign(&mut self, rhs: DenomCounts) {
        for (denomination, count) in rhs.iter() {
            self.increase(denomination, count);
        }
    }
}

struct DenomCountsVisitor;

impl<'de> Visitor<'de> for DenomCountsVisitor {
    type Value = DenomCounts;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a map from denomination value to count")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DenomCounts, A::Error> {
        let mut counts = DenomCounts::new();
        while let Some((denomination, count)) = map.next_entry::<Denomination, u32>()? {
            counts.set(denomination, count);
        }
        Ok(counts)
    }
}

impl<'de> Deserialize<'de> for DenomCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DenomCountsVisitor)
    }
}

impl From<DenomCounts> for BTreeMap<u32, u32> {
    fn from(counts: DenomCounts) -> Self {
        counts.nonzero().map(|(d, count)| (d.value(), count)).collect()
    }
}

impl fmt::Display for DenomCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "（無）");
        }
        let parts: Vec<String> = self
            .nonzero()
            .map(|(d, count)| format!("{}×{}", d, count))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
