//! LA/LB 分組（有界狀態機）
//!
//! 把收銀機B的不足金種分成兩組：
//! - LA：收銀機A可以直接供應
//! - LB：需要兌換機處理
//!
//! 每次轉移都是 [`GroupingState::step`] 的純函數呼叫，可以單獨測試。

use till_core::{Combination, DenomCounts, Denomination, Inventory, Policy, Result, TillError};

use crate::search::CombinationSearch;

/// 收銀機A能否供應該金種的不足
///
/// - 紙幣：`可用 − 最低保有 ≥ 不足`，且未設定紙幣一律走兌換機
/// - 硬幣：`可用 − 不足 ≥ 散裝下限`
pub fn can_supply(
    supplier: &Inventory,
    policy: &Policy,
    denomination: Denomination,
    shortage: u32,
) -> bool {
    let available = supplier.available(denomination);
    if denomination.is_note() {
        !policy.force_machine_for_notes
            && available.saturating_sub(policy.holdback(denomination)) >= shortage
    } else {
        available >= shortage && available - shortage >= policy.min_loose_floor
    }
}

/// 狀態轉移所需的唯讀資料
#[derive(Debug, Clone, Copy)]
pub struct GroupingContext<'a> {
    /// 供應側收銀機（A）在高
    pub supplier: &'a Inventory,

    /// 補足對象收銀機（B）的餘裕金種池
    pub pool: &'a DenomCounts,

    pub policy: &'a Policy,

    pub search: &'a CombinationSearch,
}

/// 分組結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupingOutcome {
    /// LA 由收銀機B的組合出金支應
    Funded {
        la: DenomCounts,
        lb: DenomCounts,
        combination: Combination,
        iterations: usize,
    },

    /// 沒有 LA，全部交給兌換機
    MachineOnly { lb: DenomCounts, iterations: usize },
}

impl GroupingOutcome {
    pub fn la(&self) -> DenomCounts {
        match self {
            GroupingOutcome::Funded { la, .. } => *la,
            GroupingOutcome::MachineOnly { .. } => DenomCounts::new(),
        }
    }

    pub fn lb(&self) -> DenomCounts {
        match self {
            GroupingOutcome::Funded { lb, .. } | GroupingOutcome::MachineOnly { lb, .. } => *lb,
        }
    }

    pub fn combination(&self) -> Option<&Combination> {
        match self {
            GroupingOutcome::Funded { combination, .. } => Some(combination),
            GroupingOutcome::MachineOnly { .. } => None,
        }
    }

    pub fn iterations(&self) -> usize {
        match self {
            GroupingOutcome::Funded { iterations, .. }
            | GroupingOutcome::MachineOnly { iterations, .. } => *iterations,
        }
    }
}

/// 分組狀態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupingState {
    /// 初始：只有不足金種
    Init { shortages: DenomCounts },

    /// 已分出暫定 LA（candidates）與 LB
    Partition {
        iteration: usize,
        candidates: DenomCounts,
        lb: DenomCounts,
    },

    /// 已找到組合，待重新驗證 LA
    Validate {
        iteration: usize,
        la: DenomCounts,
        lb: DenomCounts,
        combination: Combination,
    },

    /// 完成
    Finalize(GroupingOutcome),

    /// 超過反覆上限
    IterationExceeded { iterations: usize },
}

impl GroupingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GroupingState::Finalize(_) | GroupingState::IterationExceeded { .. }
        )
    }

    /// 執行一次狀態轉移
    ///
    /// 組合搜尋失敗時返回 [`TillError::CombinationNotFound`]；終態再轉移保持不變。
    pub fn step(self, ctx: &GroupingContext<'_>) -> Result<GroupingState> {
        match self {
            GroupingState::Init { shortages } => {
                let mut candidates = DenomCounts::new();
                let mut lb = DenomCounts::new();
                for (denomination, shortage) in shortages.nonzero() {
                    if can_supply(ctx.supplier, ctx.policy, denomination, shortage) {
                        candidates.set(denomination, shortage);
                    } else {
                        lb.set(denomination, shortage);
                    }
                }
                Ok(GroupingState::Partition {
                    iteration: 1,
                    candidates,
                    lb,
                })
            }

            GroupingState::Partition {
                iteration,
                candidates,
                lb,
            } => {
                if iteration > ctx.policy.max_grouping_iterations {
                    return Ok(GroupingState::IterationExceeded {
                        iterations: iteration - 1,
                    });
                }
                if candidates.is_empty() {
                    return Ok(GroupingState::Finalize(GroupingOutcome::MachineOnly {
                        lb,
                        iterations: iteration,
                    }));
                }

                let target = candidates.total_value();
                let combination =
                    ctx.search
                        .find(target, ctx.pool)
                        .ok_or(TillError::CombinationNotFound {
                            target,
                            pool: *ctx.pool,
                        })?;

                Ok(GroupingState::Validate {
                    iteration,
                    la: candidates,
                    lb,
                    combination,
                })
            }

            GroupingState::Validate {
                iteration,
                la,
                mut lb,
                combination,
            } => {
                // 檢查的是 LA 各金種的不足量，不是組合出金的金種
                let failing: Vec<(Denomination, u32)> = la
                    .nonzero()
                    .filter(|(d, shortage)| !can_supply(ctx.supplier, ctx.policy, *d, *shortage))
                    .collect();

                if failing.is_empty() {
                    return Ok(GroupingState::Finalize(GroupingOutcome::Funded {
                        la,
                        lb,
                        combination,
                        iterations: iteration,
                    }));
                }

                let mut candidates = la;
                for (denomination, shortage) in failing {
                    candidates.take(denomination);
                    lb.increase(denomination, shortage);
                }
                Ok(GroupingState::Partition {
                    iteration: iteration + 1,
                    candidates,
                    lb,
                })
            }

            terminal => Ok(terminal),
        }
    }
}

/// 由 LA 移到 LB 的金種
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demotion {
    pub iteration: usize,
    pub denomination: Denomination,
    pub quantity: u32,
}

/// 分組報告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingReport {
    pub outcome: GroupingOutcome,

    /// 第一次分組的 LA / LB
    pub initial_la: DenomCounts,
    pub initial_lb: DenomCounts,

    /// 驗證失敗而移組的記錄
    pub demotions: Vec<Demotion>,
}

/// 分組器：驅動狀態機直到終態
pub struct AllocationGrouper<'a> {
    policy: &'a Policy,
    search: CombinationSearch,
}

impl<'a> AllocationGrouper<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self {
            policy,
            search: CombinationSearch::from_policy(policy),
        }
    }

    pub fn run(
        &self,
        shortages: &DenomCounts,
        supplier: &Inventory,
        pool: &DenomCounts,
    ) -> Result<GroupingReport> {
        let ctx = GroupingContext {
            supplier,
            pool,
            policy: self.policy,
            search: &self.search,
        };

        let mut state = GroupingState::Init {
            shortages: *shortages,
        };
        let mut initial: Option<(DenomCounts, DenomCounts)> = None;
        let mut demotions = Vec::new();

        loop {
            let validated = match &state {
                GroupingState::Validate { iteration, la, .. } => Some((*iteration, *la)),
                _ => None,
            };

            state = state.step(&ctx)?;

            match &state {
                GroupingState::Partition {
                    iteration,
                    candidates,
                    lb,
                } => {
                    tracing::debug!("分組第 {} 次: LA {} / LB {}", iteration, candidates, lb);
                    if initial.is_none() {
                        initial = Some((*candidates, *lb));
                    }
                    if let Some((from_iteration, la)) = validated {
                        for (denomination, quantity) in la.nonzero() {
                            if !candidates.contains(denomination) {
                                demotions.push(Demotion {
                                    iteration: from_iteration,
                                    denomination,
                                    quantity,
                                });
                            }
                        }
                    }
                }
                GroupingState::Finalize(outcome) => {
                    let (initial_la, initial_lb) =
                        initial.unwrap_or((outcome.la(), outcome.lb()));
                    return Ok(GroupingReport {
                        outcome: outcome.clone(),
                        initial_la,
                        initial_lb,
                        demotions,
                    });
                }
                GroupingState::IterationExceeded { iterations } => {
                    tracing::warn!("分組超過反覆上限 {}", iterations);
                    return Err(TillError::IterationLimitExceeded(*iterations));
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use Denomination::*;

    fn supplier() -> Inventory {
        Inventory::from_loose(
            DenomCounts::new()
                .with(Yen5000, 20)
                .with(Yen1000, 12)
                .with(Yen100, 30)
                .with(Yen10, 5),
        )
        .with_rolls(Yen10, 1)
        .unwrap()
    }

    #[rstest]
    // 20 − 5 = 15 ≥ 15
    #[case(Yen5000, 15, true)]
    #[case(Yen5000, 16, false)]
    // 12 − 10 = 2
    #[case(Yen1000, 2, true)]
    #[case(Yen1000, 3, false)]
    // 30 − 10 = 20 ≥ 20
    #[case(Yen100, 10, true)]
    #[case(Yen100, 11, false)]
    // 散裝 5 + 棒金 50 = 55
    #[case(Yen10, 35, true)]
    #[case(Yen10, 36, false)]
    #[case(Yen1, 1, false)]
    fn test_can_supply(
        #[case] denomination: Denomination,
        #[case] shortage: u32,
        #[case] expected: bool,
    ) {
        assert_eq!(
            can_supply(&supplier(), &Policy::default(), denomination, shortage),
            expected
        );
    }

    #[test]
    fn test_force_machine_for_notes() {
        let policy = Policy::default().with_force_machine_for_notes(true);
        assert!(!can_supply(&supplier(), &policy, Yen5000, 1));
        assert!(can_supply(&supplier(), &policy, Yen100, 1));
    }

    #[test]
    fn test_init_partitions_shortages() {
        let policy = Policy::default();
        let search = CombinationSearch::default();
        let supplier = supplier();
        let pool = DenomCounts::new().with(Yen10000, 10);
        let ctx = GroupingContext {
            supplier: &supplier,
            pool: &pool,
            policy: &policy,
            search: &search,
        };

        let shortages = DenomCounts::new().with(Yen5000, 10).with(Yen1000, 5).with(Yen100, 5);
        let state = GroupingState::Init { shortages }.step(&ctx).unwrap();

        assert_eq!(
            state,
            GroupingState::Partition {
                iteration: 1,
                candidates: DenomCounts::new().with(Yen5000, 10).with(Yen100, 5),
                lb: DenomCounts::new().with(Yen1000, 5),
            }
        );
    }

    #[test]
    fn test_partition_searches_combination() {
        let policy = Policy::default();
        let search = CombinationSearch::default();
        let supplier = supplier();
        let pool = DenomCounts::new().with(Yen10000, 10);
        let ctx = GroupingContext {
            supplier: &supplier,
            pool: &pool,
            policy: &policy,
            search: &search,
        };

        let candidates = DenomCounts::new().with(Yen5000, 10).with(Yen100, 5);
        let state = GroupingState::Partition {
            iteration: 1,
            candidates,
            lb: DenomCounts::new(),
        }
        .step(&ctx)
        .unwrap();

        match state {
            GroupingState::Validate { combination, .. } => {
                assert_eq!(combination.amount, 60_000);
                assert_eq!(combination.breakdown, DenomCounts::new().with(Yen10000, 6));
            }
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[test]
    fn test_partition_without_combination_fails() {
        let policy = Policy::default();
        let search = CombinationSearch::default();
        let supplier = supplier();
        let pool = DenomCounts::new().with(Yen10000, 3).with(Yen5000, 4);
        let ctx = GroupingContext {
            supplier: &supplier,
            pool: &pool,
            policy: &policy,
            search: &search,
        };

        let result = GroupingState::Partition {
            iteration: 1,
            candidates: DenomCounts::new().with(Yen1000, 60),
            lb: DenomCounts::new(),
        }
        .step(&ctx);

        assert!(matches!(
            result,
            Err(TillError::CombinationNotFound { target: 60_000, .. })
        ));
    }

    #[test]
    fn test_validate_demotes_against_depleted_supplier() {
        let policy = Policy::default();
        let search = CombinationSearch::default();
        // 驗證時收銀機A的 100 圓只剩 25 枚
        let depleted = supplier().with_loose(Yen100, 25);
        let pool = DenomCounts::new().with(Yen10000, 10);
        let ctx = GroupingContext {
            supplier: &depleted,
            pool: &pool,
            policy: &policy,
            search: &search,
        };

        let la = DenomCounts::new().with(Yen5000, 10).with(Yen100, 10);
        let state = GroupingState::Validate {
            iteration: 1,
            la,
            lb: DenomCounts::new().with(Yen1000, 5),
            combination: Combination::from_breakdown(DenomCounts::new().with(Yen10000, 6)),
        }
        .step(&ctx)
        .unwrap();

        assert_eq!(
            state,
            GroupingState::Partition {
                iteration: 2,
                candidates: DenomCounts::new().with(Yen5000, 10),
                lb: DenomCounts::new().with(Yen1000, 5).with(Yen100, 10),
            }
        );
    }

    #[test]
    fn test_partition_iteration_bound() {
        let policy = Policy::default();
        let search = CombinationSearch::default();
        let supplier = supplier();
        let pool = DenomCounts::new();
        let ctx = GroupingContext {
            supplier: &supplier,
            pool: &pool,
            policy: &policy,
            search: &search,
        };

        let state = GroupingState::Partition {
            iteration: policy.max_grouping_iterations + 1,
            candidates: DenomCounts::new().with(Yen5000, 1),
            lb: DenomCounts::new(),
        }
        .step(&ctx)
        .unwrap();

        assert_eq!(state, GroupingState::IterationExceeded { iterations: 10 });
        assert!(state.is_terminal());
    }

    #[test]
    fn test_run_machine_only() {
        let policy = Policy::default();
        let report = AllocationGrouper::new(&policy)
            .run(
                &DenomCounts::new().with(Yen1000, 5).with(Yen1, 30),
                &supplier(),
                &DenomCounts::new().with(Yen10000, 2),
            )
            .unwrap();

        assert_eq!(
            report.outcome,
            GroupingOutcome::MachineOnly {
                lb: DenomCounts::new().with(Yen1000, 5).with(Yen1, 30),
                iterations: 1,
            }
        );
        assert!(report.initial_la.is_empty());
        assert!(report.demotions.is_empty());
    }

    #[test]
    fn test_run_funded() {
        let policy = Policy::default();
        let shortages = DenomCounts::new().with(Yen5000, 10).with(Yen1, 30);
        let report = AllocationGrouper::new(&policy)
            .run(&shortages, &supplier(), &DenomCounts::new().with(Yen10000, 10))
            .unwrap();

        assert_eq!(report.outcome.la(), DenomCounts::new().with(Yen5000, 10));
        assert_eq!(report.outcome.lb(), DenomCounts::new().with(Yen1, 30));
        assert_eq!(report.outcome.combination().map(|c| c.amount), Some(50_000));
        assert_eq!(report.outcome.iterations(), 1);
    }
}
