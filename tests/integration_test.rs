//! 集成測試

use chrono::NaiveDate;
use rstest::rstest;
use till::*;
use Denomination::*;

/// 各金種剛好在目標數量的收銀機B
fn register_b_at_target() -> DenomCounts {
    let mut loose = DenomCounts::new().with(Yen5000, 20).with(Yen1000, 40);
    for coin in Denomination::COINS {
        loose.set(coin, 50);
    }
    loose
}

/// 棒金齊全的收銀機A（硬幣合計 ¥92,670）
fn register_a() -> Inventory {
    let loose = DenomCounts::new()
        .with(Yen10000, 10)
        .with(Yen5000, 30)
        .with(Yen1000, 60)
        .with(Yen500, 20)
        .with(Yen100, 25)
        .with(Yen50, 20)
        .with(Yen10, 20)
        .with(Yen5, 20)
        .with(Yen1, 20);
    let rolls = DenomCounts::new()
        .with(Yen500, 2)
        .with(Yen100, 5)
        .with(Yen50, 1)
        .with(Yen10, 2)
        .with(Yen5, 1)
        .with(Yen1, 2);
    Inventory::new(loose, rolls).unwrap()
}

fn planner() -> CashExchangePlanner {
    CashExchangePlanner::new(Policy::default()).unwrap()
}

fn transfers(plan: &ExchangePlan) -> Vec<(Party, Party, DenomCounts)> {
    plan.steps
        .iter()
        .filter_map(|step| match &step.action {
            StepAction::Transfer {
                from,
                to,
                breakdown,
            } => Some((*from, *to, *breakdown)),
            _ => None,
        })
        .collect()
}

fn roll_advisories(plan: &ExchangePlan) -> Vec<Vec<Denomination>> {
    plan.steps
        .iter()
        .filter_map(|step| match &step.action {
            StepAction::Info { title, lines } if title == "收銀機A 拆開棒金" => {
                Some(lines.iter().map(|l| l.denomination).collect())
            }
            _ => None,
        })
        .collect()
}

fn final_inventory(plan: &ExchangePlan, party: Party) -> &Inventory {
    &plan.ledger.register(party).unwrap().final_inventory
}

#[test]
fn test_note_shortage_funded_by_register_a() {
    // 收銀機B 5000 圓少 10 張，以 10000 圓 5 張向收銀機A換
    let register_b =
        Inventory::from_loose(register_b_at_target().with(Yen5000, 10).with(Yen10000, 5));
    let plan = planner().plan(&register_a(), &register_b, None);

    assert_eq!(plan.outcome, PlanOutcome::Completed);
    assert_eq!(
        transfers(&plan),
        vec![
            (
                Party::RegisterB,
                Party::RegisterA,
                DenomCounts::new().with(Yen10000, 5)
            ),
            (
                Party::RegisterA,
                Party::RegisterB,
                DenomCounts::new().with(Yen5000, 10)
            ),
            // 收銀機A 5000 圓剩 20 張，補回 30 張
            (
                Party::RegisterA,
                Party::Machine,
                DenomCounts::new().with(Yen10000, 5)
            ),
            (
                Party::Machine,
                Party::RegisterA,
                DenomCounts::new().with(Yen5000, 10)
            ),
        ]
    );

    let b = final_inventory(&plan, Party::RegisterB);
    assert!(!Analyzer::analyze(b, &Policy::default()).has_shortage());
    assert_eq!(b.available(Yen10000), 0);

    let a = final_inventory(&plan, Party::RegisterA);
    assert_eq!(a.available(Yen10000), 10);
    assert_eq!(a.available(Yen5000), 30);
    assert!(plan.ledger.balanced);
}

#[test]
fn test_machine_group_with_change_return() {
    // 1000 圓少 5 張（收銀機A只有 12 張 → LB），1 圓少 20 枚（LA）
    let register_b = Inventory::from_loose(
        register_b_at_target()
            .with(Yen10000, 8)
            .with(Yen1000, 35)
            .with(Yen1, 30),
    );
    let register_a = register_a().with_loose(Yen1000, 12);
    let plan = planner().plan(&register_a, &register_b, None);

    assert_eq!(plan.outcome, PlanOutcome::Completed);
    assert_eq!(plan.steps.len(), 19);
    assert_eq!(plan.steps_of(StepKind::MachineExchange).count(), 2);

    let transfers = transfers(&plan);
    // LA 資金 10,000 − LA 20 = 找零 9,980
    assert!(transfers.contains(&(
        Party::RegisterA,
        Party::RegisterB,
        DenomCounts::new()
            .with(Yen5000, 1)
            .with(Yen1000, 4)
            .with(Yen500, 1)
            .with(Yen100, 4)
            .with(Yen50, 1)
            .with(Yen10, 3)
    )));
    // LB：投入 10000 圓 1 張，取回 1000 圓 5 張 + 找零 5000 圓 1 張
    assert_eq!(
        transfers.last(),
        Some(&(
            Party::Machine,
            Party::RegisterB,
            DenomCounts::new().with(Yen5000, 1).with(Yen1000, 5)
        ))
    );

    let b = final_inventory(&plan, Party::RegisterB);
    assert!(!Analyzer::analyze(b, &Policy::default()).has_shortage());
    assert_eq!(b.available(Yen10000), 6);
    assert_eq!(b.available(Yen1000), 44);
    assert_eq!(b.available(Yen1), 50);

    let a = plan.ledger.register(Party::RegisterA).unwrap();
    assert_eq!(a.withdrawn_value, 60_000);
    assert_eq!(a.deposited_value, 60_000);
    assert_eq!(a.final_inventory.available(Yen1000), 58);
    assert!(plan.ledger.balanced);
}

#[test]
fn test_roll_break_advisory_after_la() {
    let register_b = Inventory::from_loose(
        register_b_at_target()
            .with(Yen10000, 8)
            .with(Yen1000, 35)
            .with(Yen1, 30),
    );
    let plan = planner().plan(&register_a().with_loose(Yen1000, 12), &register_b, None);

    let advisory = plan
        .steps
        .iter()
        .find(|s| {
            matches!(&s.action, StepAction::Info { title, .. } if title == "收銀機A 拆開棒金")
        })
        .expect("break-roll advisory");
    assert!(advisory.requires_action);
    match &advisory.action {
        StepAction::Info { lines, .. } => {
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].denomination, Yen1);
        }
        other => panic!("unexpected action: {:?}", other),
    }
}

#[test]
fn test_roll_floor_rechecked_after_change_return() {
    let register_b = Inventory::from_loose(
        register_b_at_target()
            .with(Yen10000, 8)
            .with(Yen1000, 35)
            .with(Yen1, 30),
    );
    let plan = planner().plan(&register_a().with_loose(Yen1000, 12), &register_b, None);

    // LA 後只有 1 圓；找零帶走 500、50、10 圓後再各提醒一次
    assert_eq!(
        roll_advisories(&plan),
        vec![vec![Yen1], vec![Yen500, Yen50, Yen10]]
    );

    let change_step = plan
        .steps
        .iter()
        .position(|s| s.rationale.starts_with("找零返還"))
        .unwrap();
    assert!(plan.steps[change_step + 1].requires_action);

    let a = final_inventory(&plan, Party::RegisterA);
    for coin in [Yen500, Yen50, Yen10] {
        assert!(a.loose(coin) < Policy::default().min_loose_floor);
        assert!(a.rolls(coin) > 0);
    }
}

#[test]
fn test_replenishment_advisories_reach_the_plan() {
    // 1 圓棒金 1 捲 → 補到 2 捲，再加 1 捲湊偶數，超過上限 1 捲
    let policy = Policy::default()
        .with_roll_ceiling(Yen1, 1)
        .with_coin_total_target(200_000);
    let register_a = register_a().with_rolls(Yen1, 1).unwrap();
    let register_b = Inventory::from_loose(register_b_at_target());
    let plan = CashExchangePlanner::new(policy)
        .unwrap()
        .plan(&register_a, &register_b, None);

    assert_eq!(plan.outcome, PlanOutcome::Completed);
    let titles: Vec<&str> = plan
        .warnings()
        .filter_map(|s| match &s.action {
            StepAction::Warning { title, .. } => Some(title.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(titles, vec!["棒金上限警告", "硬幣合計未達目標"]);

    match &plan.warnings().next().unwrap().action {
        StepAction::Warning { lines, .. } => {
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].denomination, Yen1);
            assert_eq!(lines[0].quantity, 100);
        }
        other => panic!("unexpected action: {:?}", other),
    }

    // 兌換機仍照 LC 執行
    let a = final_inventory(&plan, Party::RegisterA);
    assert_eq!(a.available(Yen1), 20 + 50 + 100);
    assert!(plan.ledger.balanced);
}

#[test]
fn test_machine_only_when_register_a_cannot_supply() {
    let register_b =
        Inventory::from_loose(register_b_at_target().with(Yen1000, 30).with(Yen10000, 3));
    let register_a = register_a().with_loose(Yen1000, 12);
    let plan = planner().plan(&register_a, &register_b, None);

    assert_eq!(plan.outcome, PlanOutcome::Completed);
    assert!(!transfers(&plan)
        .iter()
        .any(|(from, to, _)| *from == Party::RegisterB && *to == Party::RegisterA));

    let b = final_inventory(&plan, Party::RegisterB);
    assert_eq!(b.available(Yen1000), 40);
    assert_eq!(b.available(Yen10000), 2);
    assert!(plan.ledger.balanced);
}

#[test]
fn test_force_machine_for_notes() {
    let policy = Policy::default().with_force_machine_for_notes(true);
    let register_b =
        Inventory::from_loose(register_b_at_target().with(Yen5000, 10).with(Yen10000, 5));
    let plan = CashExchangePlanner::new(policy)
        .unwrap()
        .plan(&register_a(), &register_b, None);

    assert_eq!(plan.outcome, PlanOutcome::Completed);
    let transfers = transfers(&plan);
    assert_eq!(
        transfers,
        vec![
            (
                Party::RegisterB,
                Party::Machine,
                DenomCounts::new().with(Yen10000, 5)
            ),
            (
                Party::Machine,
                Party::RegisterB,
                DenomCounts::new().with(Yen5000, 10)
            ),
        ]
    );
}

#[test]
fn test_no_surplus_reports_error() {
    let register_b = Inventory::from_loose(register_b_at_target().with(Yen5000, 10));
    let plan = planner().plan(&register_a(), &register_b, None);

    assert_eq!(
        plan.outcome,
        PlanOutcome::Aborted {
            reason: TillError::NoSurplus(Party::RegisterB).to_string()
        }
    );
    assert_eq!(plan.errors().count(), 1);
    assert!(plan.ledger.entries.is_empty());
}

#[test]
fn test_combination_not_found_aborts() {
    // 收銀機B 只有 500 圓多 1 枚，湊不出 LA 的 10,000
    let register_b =
        Inventory::from_loose(register_b_at_target().with(Yen1000, 30).with(Yen500, 51));
    let plan = planner().plan(&register_a(), &register_b, None);

    assert!(plan.outcome.is_aborted());
    let error = plan.steps.last().unwrap();
    match &error.action {
        StepAction::Error { message } => assert!(message.contains("¥10000")),
        other => panic!("unexpected action: {:?}", other),
    }
    assert!(plan.ledger.entries.is_empty());
    assert_eq!(final_inventory(&plan, Party::RegisterB), &register_b);
}

#[test]
fn test_identical_inputs_identical_plans() {
    let register_b = Inventory::from_loose(
        register_b_at_target()
            .with(Yen10000, 8)
            .with(Yen1000, 35)
            .with(Yen1, 30),
    );
    let register_a = register_a().with_loose(Yen1000, 12);
    let date = NaiveDate::from_ymd_opt(2026, 10, 19);

    let first = planner().plan(&register_a, &register_b, date);
    let second = planner().plan(&register_a, &register_b, date);

    assert_eq!(first.steps, second.steps);
    assert_eq!(first.ledger, second.ledger);
    assert_eq!(first.planned_on, date);
    assert_ne!(first.run_id, second.run_id);
}

#[test]
fn test_plan_from_demo_request() {
    let plan = plan_from_json(include_str!("../demos/request.json")).unwrap();

    assert_eq!(plan.outcome, PlanOutcome::Completed);
    assert_eq!(plan.planned_on, NaiveDate::from_ymd_opt(2026, 10, 19));
    assert!(plan.ledger.balanced);

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["outcome"]["status"], "completed");
    let back: ExchangePlan = serde_json::from_value(json).unwrap();
    assert_eq!(back, plan);
}

#[rstest]
#[case(r#"{"rolls": {"100": 100000000}}"#)]
#[case(r#"{"loose": {"1": 4294967295}}"#)]
#[case(r#"{"loose": {"10": 99999999}, "rolls": {"10": 1}}"#)]
fn test_oversized_snapshot_rejected(#[case] register_a: &str) {
    let json = format!(r#"{{"register_a": {}, "register_b": {{}}}}"#, register_a);
    match plan_from_json(&json) {
        Err(TillError::Json(err)) => assert!(err.to_string().contains("上限")),
        other => panic!("unexpected result: {:?}", other.map(|p| p.outcome)),
    }
}

#[rstest]
#[case(MAX_PIECES, 0)]
#[case(MAX_PIECES - ROLL_SIZE * 4, 4)]
fn test_large_snapshot_plans_without_overflow(#[case] loose: u32, #[case] rolls: u32) {
    let register_a = register_a()
        .with_loose(Yen100, loose)
        .with_rolls(Yen100, rolls)
        .unwrap();
    let register_b =
        Inventory::from_loose(register_b_at_target().with(Yen100, 10).with(Yen10000, 2));
    let plan = planner().plan(&register_a, &register_b, None);

    assert!(plan.ledger.balanced);
    assert_eq!(
        final_inventory(&plan, Party::RegisterB).available(Yen100),
        Policy::default().target(Yen100)
    );
}
