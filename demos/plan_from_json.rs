//! 從 JSON 請求產生調撥計劃
//!
//! ```text
//! RUST_LOG=debug cargo run --example plan_from_json -- demos/request.json
//! ```

use anyhow::Context;
use till::{PlanOutcome, PlanRequest};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/request.json".to_string());
    let json = std::fs::read_to_string(&path).with_context(|| format!("無法讀取 {}", path))?;
    let request = PlanRequest::from_json_str(&json).context("請求格式錯誤")?;

    println!("=== 現金調撥計劃 ===\n");
    println!("收銀機A: {}", till::format_yen(request.register_a.total_value()));
    println!("收銀機B: {}\n", till::format_yen(request.register_b.total_value()));

    let plan = request.plan()?;

    for step in &plan.steps {
        let marker = if step.requires_action { "▶" } else { " " };
        println!("{} {}", marker, step);
        if !step.rationale.is_empty() {
            println!("      {}", step.rationale);
        }
    }

    println!();
    match &plan.outcome {
        PlanOutcome::Completed => println!("結果: 完成"),
        PlanOutcome::ReplenishmentAborted { reason } => println!("結果: 補充中止（{}）", reason),
        PlanOutcome::Aborted { reason } => println!("結果: 中止（{}）", reason),
    }

    for register in &plan.ledger.registers {
        println!(
            "{}: 出金 {} / 入金 {} / 對帳 {}",
            register.party,
            till::format_yen(register.withdrawn_value),
            till::format_yen(register.deposited_value),
            if register.reconciled { "OK" } else { "NG" }
        );
    }

    if let Some(ms) = plan.calculation_time_ms {
        println!("\n計算耗時: {} ms", ms);
    }

    Ok(())
}
