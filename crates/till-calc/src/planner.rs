//! 調撥主計劃器

use chrono::NaiveDate;
use till_core::{
    format_yen, Combination, DenomCounts, DenomLine, Inventory, Party, Policy, Result, StepAction,
    TillError,
};
use uuid::Uuid;

use crate::analyzer::Analyzer;
use crate::exchange::{ExchangeMachine, MachineExchange};
use crate::grouping::{AllocationGrouper, GroupingOutcome, GroupingReport};
use crate::ledger::Ledger;
use crate::replenishment::{ReplenishmentPlan, RollAction, RollCheck, RollMaintainer};
use crate::search::CombinationSearch;
use crate::step_log::StepLog;
use crate::{ExchangePlan, PlanOutcome};

/// 現金調撥計劃器
///
/// 收銀機A為供應側（持有棒金），收銀機B為補足對象。
/// 每次計劃都在輸入在高的複本上進行，輸入本身不會被修改。
pub struct CashExchangePlanner {
    /// 調撥政策
    policy: Policy,

    /// 兌換機
    machine: ExchangeMachine,
}

impl CashExchangePlanner {
    /// 創建計劃器（先檢查政策一致性）
    pub fn new(policy: Policy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            machine: ExchangeMachine::from_policy(&policy),
            policy,
        })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// 主計劃入口
    ///
    /// 致命錯誤不會以 `Err` 返回：該階段的移動全部回溯，並在步驟中留下一筆錯誤。
    pub fn plan(
        &self,
        register_a: &Inventory,
        register_b: &Inventory,
        planned_on: Option<NaiveDate>,
    ) -> ExchangePlan {
        tracing::info!(
            "開始調撥計劃：收銀機A {}，收銀機B {}",
            format_yen(register_a.total_value()),
            format_yen(register_b.total_value())
        );

        let start_time = std::time::Instant::now();

        let mut log = StepLog::new();
        let mut ledger = Ledger::new(register_a.clone(), register_b.clone());
        let outcome = self.run(&mut log, &mut ledger);

        let report = ledger.report();
        if !report.balanced {
            tracing::warn!("帳本未平衡: {:?}", report.registers);
        }

        let elapsed = start_time.elapsed();
        tracing::info!("調撥計劃完成（{:?}），耗時 {:?}", outcome, elapsed);
        tracing::info!("步驟數量: {}，帳本記錄: {}", log.len(), report.entries.len());

        ExchangePlan {
            run_id: Uuid::new_v4(),
            planned_on,
            outcome,
            steps: log.into_steps(),
            ledger: report,
            calculation_time_ms: Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    fn run(&self, log: &mut StepLog, ledger: &mut Ledger) -> PlanOutcome {
        // Step 1: 分析收銀機B
        tracing::debug!("Step 1: 分析收銀機B");
        let analysis_b = Analyzer::analyze(ledger.register_b(), &self.policy);

        if !analysis_b.has_shortage() {
            log.info(
                "收銀機B 不需要兌換",
                Vec::new(),
                None,
                "所有金種都已達目標數量",
            );
            return Self::finish(self.replenish(log, ledger));
        }

        log.info(
            "收銀機B 不足金種",
            analysis_b.shortage_lines(),
            Some(analysis_b.total_shortage()),
            format!("不足合計 {}", format_yen(analysis_b.total_shortage())),
        );

        if !analysis_b.has_surplus() {
            return Self::abort(log, TillError::NoSurplus(Party::RegisterB));
        }

        log.info(
            "收銀機B 餘裕金種",
            analysis_b.surplus_lines(),
            Some(analysis_b.total_surplus()),
            format!("餘裕合計 {}", format_yen(analysis_b.total_surplus())),
        );

        // Step 2: 分析收銀機A（LC 判斷用）
        tracing::debug!("Step 2: 分析收銀機A");
        let analysis_a = Analyzer::analyze(ledger.register_a(), &self.policy);
        if analysis_a.has_surplus() {
            log.info(
                "收銀機A 餘裕金種",
                analysis_a.surplus_lines(),
                Some(analysis_a.total_surplus()),
                "供 LC 判斷",
            );
        }

        // Step 3: LA/LB 分組
        tracing::debug!("Step 3: LA/LB 分組");
        let grouping = match AllocationGrouper::new(&self.policy).run(
            &analysis_b.shortage_counts(),
            ledger.register_a(),
            &analysis_b.surplus_pool(),
        ) {
            Ok(report) => report,
            Err(err) => return Self::abort(log, err),
        };
        Self::log_grouping(log, &grouping, ledger.register_a());

        // Step 4: 執行（失敗時整段回溯）
        tracing::debug!("Step 4: 執行調撥");
        let mark = log.mark();
        let snapshot = ledger.clone();
        match self.execute(log, ledger, &grouping.outcome) {
            Ok(outcome) => outcome,
            Err(err) => {
                *ledger = snapshot;
                log.truncate(mark);
                Self::abort(log, err)
            }
        }
    }

    fn execute(
        &self,
        log: &mut StepLog,
        ledger: &mut Ledger,
        outcome: &GroupingOutcome,
    ) -> Result<PlanOutcome> {
        let la = outcome.la();
        let lb = outcome.lb();
        let combination = outcome.combination().cloned().unwrap_or_else(Combination::empty);

        // LB 的基準紙幣以扣除組合出金後的收銀機B檢查
        let mut projected_b = ledger.register_b().clone();
        projected_b.withdraw_all(&combination.breakdown)?;
        let lb_exchange = self.machine.plan(Party::RegisterB, &lb, &projected_b)?;

        if !combination.breakdown.is_empty() || lb_exchange.is_some() {
            Self::log_combined_withdrawal(log, &combination, lb_exchange.as_ref());
        }

        if !combination.breakdown.is_empty() {
            ledger.transfer(Party::RegisterB, Party::RegisterA, &combination.breakdown)?;
            log.transfer(
                Party::RegisterB,
                Party::RegisterA,
                combination.breakdown,
                format!("LA 資金 {} 存入收銀機A", format_yen(combination.amount)),
            );
        }

        let supplier_before = ledger.register_a().clone();
        if !la.is_empty() {
            ledger.transfer(Party::RegisterA, Party::RegisterB, &la)?;
            log.transfer(
                Party::RegisterA,
                Party::RegisterB,
                la,
                format!("收銀機A 供應 LA {}", format_yen(la.total_value())),
            );

            let after = Analyzer::analyze(ledger.register_a(), &self.policy);
            if after.has_shortage() {
                log.info(
                    "收銀機A 不足金種",
                    after.shortage_lines(),
                    Some(after.total_shortage()),
                    format!("供應 LA 後不足合計 {}", format_yen(after.total_shortage())),
                );
            }
        }

        let maintainer = RollMaintainer::new(&self.policy);
        Self::log_roll_checks(log, &self.policy, maintainer.check_rolls(&supplier_before, &la));

        let replenishment = self.replenish(log, ledger);

        let overage = combination.amount.saturating_sub(la.total_value());
        if overage > 0 {
            let before_change = ledger.register_a().clone();
            let change = Self::return_change(log, ledger, overage)?;
            Self::log_roll_checks(
                log,
                &self.policy,
                maintainer.check_withdrawal(&before_change, &change),
            );
        }

        if let Some(exchange) = &lb_exchange {
            Self::run_machine(log, ledger, exchange)?;
        }

        Ok(Self::finish(replenishment))
    }

    /// 收銀機A的 LC 補充（獨立回溯，失敗不影響已完成的調撥）
    ///
    /// 返回中止原因。
    fn replenish(&self, log: &mut StepLog, ledger: &mut Ledger) -> Option<String> {
        tracing::debug!("LC: 收銀機A 補充");
        let plan = RollMaintainer::new(&self.policy).plan(ledger.register_a());
        if plan.is_empty() && plan.shortfall().is_none() {
            return None;
        }

        let mark = log.mark();
        let snapshot = ledger.clone();
        match self.run_replenishment(log, ledger, &plan) {
            Ok(()) => None,
            Err(err) => {
                *ledger = snapshot;
                log.truncate(mark);
                tracing::warn!("收銀機A 補充中止: {}", err);
                log.error(format!("收銀機A 補充中止: {}", err));
                Some(err.to_string())
            }
        }
    }

    fn run_replenishment(
        &self,
        log: &mut StepLog,
        ledger: &mut Ledger,
        plan: &ReplenishmentPlan,
    ) -> Result<()> {
        if !plan.is_empty() {
            log.info(
                "LC 收銀機A 兌換機補充",
                plan.lines(ledger.register_a()),
                Some(plan.total_value()),
                format!(
                    "LC 合計 {}，硬幣合計 {} → {}",
                    format_yen(plan.total_value()),
                    format_yen(plan.coin_total_before),
                    format_yen(plan.coin_total_after)
                ),
            );
        }

        if !plan.ceiling_warnings.is_empty() {
            log.warning(
                "棒金上限警告",
                "補充後超過棒金保管上限",
                plan.ceiling_warnings.iter().map(|w| w.line()).collect(),
            );
        }

        if let Some(gap) = plan.shortfall() {
            log.warning(
                "硬幣合計未達目標",
                format!(
                    "預計 {} < 目標 {}（差 {}），棒金已達上限",
                    format_yen(plan.coin_total_after),
                    format_yen(plan.coin_total_target),
                    format_yen(gap)
                ),
                Vec::new(),
            );
        }

        let exchange = self
            .machine
            .plan(Party::RegisterA, &plan.group.counts, ledger.register_a())?;
        if let Some(exchange) = exchange {
            Self::run_machine(log, ledger, &exchange)?;
        }
        Ok(())
    }

    /// 投入基準紙幣 → 兌換 → 取回申請金種與找零
    fn run_machine(
        log: &mut StepLog,
        ledger: &mut Ledger,
        exchange: &MachineExchange,
    ) -> Result<()> {
        let register = exchange.funded_by;
        let inserted = exchange.inserted();
        let dispensed = exchange.dispensed();

        ledger.transfer(register, Party::Machine, &inserted)?;
        log.transfer(
            register,
            Party::Machine,
            inserted,
            format!("{}×{} 投入兌換機", exchange.base_note, exchange.base_notes),
        );

        log.machine_exchange(exchange);

        ledger.transfer(Party::Machine, register, &dispensed)?;
        log.transfer(
            Party::Machine,
            register,
            dispensed,
            format!("兌換機取出的現金存入{}", register),
        );
        Ok(())
    }

    /// 組合出金超過 LA 的部分由收銀機A找還，返回找零明細
    fn return_change(log: &mut StepLog, ledger: &mut Ledger, overage: u64) -> Result<DenomCounts> {
        let (breakdown, remaining) =
            CombinationSearch::greedy_partial(overage, &ledger.register_a().available_counts());
        if remaining > 0 {
            return Err(TillError::ChangeUnavailable {
                party: Party::RegisterA,
                amount: overage,
                remaining,
            });
        }

        ledger.transfer(Party::RegisterA, Party::RegisterB, &breakdown)?;
        log.transfer(
            Party::RegisterA,
            Party::RegisterB,
            breakdown,
            format!("找零返還：LA 出金與 LA 不足的差額 {}", format_yen(overage)),
        );
        Ok(breakdown)
    }

    fn log_grouping(log: &mut StepLog, report: &GroupingReport, supplier: &Inventory) {
        if !report.initial_la.is_empty() {
            let lines = report
                .initial_la
                .nonzero()
                .map(|(d, quantity)| {
                    let stock = supplier.available(d);
                    DenomLine::new(
                        d,
                        quantity,
                        format!(
                            "不足 {} 枚（收銀機A 庫存 {} → 供應後 {}）",
                            quantity,
                            stock,
                            stock.saturating_sub(quantity)
                        ),
                    )
                })
                .collect();
            log.info(
                "LA 收銀機A 可供應的金種",
                lines,
                Some(report.initial_la.total_value()),
                format!("LA 合計 {}", format_yen(report.initial_la.total_value())),
            );
        }

        if !report.initial_lb.is_empty() {
            let lines = report
                .initial_lb
                .nonzero()
                .map(|(d, quantity)| {
                    DenomLine::new(
                        d,
                        quantity,
                        format!(
                            "不足 {} 枚（收銀機A 庫存 {}，不足以供應）",
                            quantity,
                            supplier.available(d)
                        ),
                    )
                })
                .collect();
            log.info(
                "LB 需要兌換機的金種",
                lines,
                Some(report.initial_lb.total_value()),
                format!("LB 合計 {}", format_yen(report.initial_lb.total_value())),
            );
        }

        for demotion in &report.demotions {
            log.warning(
                format!("再計算（第 {} 次）", demotion.iteration),
                "收銀機A 無法供應，移到 LB",
                vec![DenomLine::new(
                    demotion.denomination,
                    demotion.quantity,
                    "LA → LB",
                )],
            );
        }
    }

    fn log_combined_withdrawal(
        log: &mut StepLog,
        combination: &Combination,
        lb_exchange: Option<&MachineExchange>,
    ) {
        let mut lines: Vec<DenomLine> = combination
            .breakdown
            .nonzero()
            .map(|(d, quantity)| DenomLine::new(d, quantity, "LA 資金"))
            .collect();
        let mut total = combination.amount;
        let mut lb_amount = 0;

        if let Some(exchange) = lb_exchange {
            lines.push(DenomLine::new(
                exchange.base_note,
                exchange.base_notes,
                "兌換機用（LB）",
            ));
            total += exchange.withdrawal_amount;
            lb_amount = exchange.withdrawal_amount;
        }

        log.info(
            "收銀機B 出金（LA + LB）",
            lines,
            Some(total),
            format!(
                "LA: {}，LB: {}",
                format_yen(combination.amount),
                format_yen(lb_amount)
            ),
        );
    }

    fn log_roll_checks(log: &mut StepLog, policy: &Policy, checks: Vec<RollCheck>) {
        let to_break: Vec<DenomLine> = checks
            .iter()
            .filter(|c| c.action == RollAction::BreakRoll)
            .map(|c| c.line())
            .collect();
        if !to_break.is_empty() {
            log.push(
                StepAction::Info {
                    title: "收銀機A 拆開棒金".to_string(),
                    lines: to_break,
                },
                None,
                format!("散裝低於 {} 枚，請拆開棒金", policy.min_loose_floor),
                true,
            );
        }

        let missing: Vec<DenomLine> = checks
            .iter()
            .filter(|c| c.action == RollAction::NeedsReplenishment)
            .map(|c| c.line())
            .collect();
        if !missing.is_empty() {
            log.warning("收銀機A 棒金不足", "需要兌換機補充", missing);
        }
    }

    fn abort(log: &mut StepLog, err: TillError) -> PlanOutcome {
        tracing::warn!("調撥中止: {}", err);
        let reason = err.to_string();
        log.error(reason.clone());
        PlanOutcome::Aborted { reason }
    }

    fn finish(replenishment: Option<String>) -> PlanOutcome {
        match replenishment {
            None => PlanOutcome::Completed,
            Some(reason) => PlanOutcome::ReplenishmentAborted { reason },
        }
    }
}
