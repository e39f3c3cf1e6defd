use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use wallet_ledger::model::{DiscountKind, NewDiscount};
use wallet_ledger::{Amount, Command, Config, Engine};

/// Generates valid command sequences for benchmarking.
///
/// Every wallet is registered first, then each wallet repeats:
/// 1. Deposit 100
/// 2. Deposit 50
/// 3. Withdrawal 30
///
/// This ensures withdrawals never exceed the balance.
pub struct CommandGenerator {
    num_wallets: usize,
    commands_per_wallet: usize,
    current_wallet: usize,
    current_step: usize,
}

impl CommandGenerator {
    pub fn new(num_wallets: usize, commands_per_wallet: usize) -> Self {
        Self {
            num_wallets,
            commands_per_wallet,
            current_wallet: 0,
            current_step: 0,
        }
    }
}

fn phone(n: usize) -> String {
    format!("+1555{n:06}")
}

impl Iterator for CommandGenerator {
    type Item = Command;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_wallet >= self.num_wallets {
            return None;
        }

        let phone = phone(self.current_wallet);
        let command = match self.current_step {
            0 => Command::Register { phone },
            step => match (step - 1) % 3 {
                0 => Command::Deposit {
                    phone,
                    amount: Amount::from_units(100),
                    description: "deposit".to_string(),
                },
                1 => Command::Deposit {
                    phone,
                    amount: Amount::from_units(50),
                    description: "deposit".to_string(),
                },
                _ => Command::Withdrawal {
                    phone,
                    amount: Amount::from_units(30),
                    description: "withdrawal".to_string(),
                },
            },
        };

        self.current_step += 1;

        // Move to next wallet after its register plus commands_per_wallet commands
        if self.current_step > self.commands_per_wallet {
            self.current_step = 0;
            self.current_wallet += 1;
        }

        Some(command)
    }
}

fn discount(code: &str, usage_limit: u64) -> Command {
    Command::CreateDiscount(NewDiscount {
        code: Some(code.to_string()),
        description: "bench promo".to_string(),
        amount: Amount::from_units(10),
        usage_limit,
        expires_at: None,
        kind: DiscountKind::Voucher,
    })
}

fn bench_ledger_commands(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("ledger");

    for (wallets, per_wallet) in [(1, 1_000), (100, 100), (1_000, 10)] {
        let label = format!("{wallets}w_{per_wallet}cmd");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(wallets, per_wallet),
            |b, &(wallets, per_wallet)| {
                b.to_async(&runtime).iter(|| async move {
                    let engine = Engine::in_memory(&Config::default());
                    for command in CommandGenerator::new(wallets, per_wallet) {
                        let _ = black_box(engine.apply(command).await);
                    }
                    engine.shutdown().await;
                });
            },
        );
    }

    group.finish();
}

fn bench_redemptions(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("redemptions");

    for count in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.to_async(&runtime).iter(|| async move {
                let engine = Engine::in_memory(&Config::default());
                let _ = engine.apply(discount("BENCH", count as u64)).await;
                for n in 0..count {
                    let redeem = Command::Redeem {
                        code: "BENCH".to_string(),
                        phone: phone(n),
                    };
                    let _ = black_box(engine.apply(redeem).await);
                }
                engine.shutdown().await;
            });
        });
    }

    // Half the callers arrive after the limit is reached
    group.bench_function("1k_over_limit", |b| {
        b.to_async(&runtime).iter(|| async {
            let engine = Engine::in_memory(&Config::default());
            let _ = engine.apply(discount("BENCH", 500)).await;
            for n in 0..1_000 {
                let redeem = Command::Redeem {
                    code: "BENCH".to_string(),
                    phone: phone(n),
                };
                let _ = black_box(engine.apply(redeem).await);
            }
            engine.shutdown().await;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ledger_commands, bench_redemptions);
criterion_main!(benches);
