//! Главный исполняемый файл RustKV

use clap::{Parser, Subcommand};
use rustkv::common::constants::DEMO_MAX_POLL_ATTEMPTS;
use rustkv::common::DatabaseConfig;
use rustkv::core::{AbortMode, OperationResult};
use rustkv::{Database, VERSION};
use std::path::Path;

#[derive(Parser)]
#[command(name = "rustkv")]
#[command(about = "Транзакционное key-value хранилище на Rust")]
#[command(version = VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Путь к файлу конфигурации
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Запускает демонстрацию протокола блокировок и разрешения взаимоблокировки
    Demo,
    /// Показывает информацию о базе данных
    Info,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DatabaseConfig::from_file(Path::new(path))?,
        None => DatabaseConfig::from_env()?,
    };

    match &cli.command {
        Some(Commands::Demo) => run_demo(config)?,
        Some(Commands::Info) => {
            println!("Информация о базе данных:");
            println!("Имя: {}", config.name);
            println!("Версия: {}", VERSION);
            println!(
                "Интервал опроса блокировок: {} мс",
                config.lock_poll_interval_ms
            );
            println!(
                "Интервал обнаружения взаимоблокировок: {} мс",
                config.deadlock_detection_interval_ms
            );
        }
        None => {
            println!("Добро пожаловать в RustKV v{}!", VERSION);
            println!("Используйте --help для получения справки");
        }
    }

    Ok(())
}

/// Печатает результат операции или признак блокировки
fn show(step: &str, result: &Option<OperationResult>) {
    match result {
        Some(result) => println!("   {} -> {}", step, result),
        None => println!("   {} -> заблокировано, транзакция ожидает", step),
    }
}

/// Демонстрация: две транзакции входят во взаимоблокировку, координатор
/// называет жертву, драйвер отменяет ее, и выжившая транзакция завершается
fn run_demo(config: DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::with_config(config.clone())?;

    println!("=== Демонстрация 2PL и разрешения взаимоблокировки ===\n");

    println!("1. Запись начальных значений");
    let mut t1 = db.begin_transaction()?;
    let mut t2 = db.begin_transaction()?;
    show("T1 PUT a=1", &t1.perform_put("a", "1")?);
    show("T2 PUT b=2", &t2.perform_put("b", "2")?);
    println!();

    println!("2. Перекрестные чтения создают взаимоблокировку");
    show("T1 GET b", &t1.perform_get("b")?);
    show("T2 GET a", &t2.perform_get("a")?);
    println!();

    println!("3. Цикл драйвера: опрос заблокированных транзакций и координатор");
    // Обнаружение выполняется реже опроса, согласно конфигурации
    let detect_every = (config.deadlock_detection_interval_ms / config.lock_poll_interval_ms).max(1);
    let mut t1 = Some(t1);
    let mut t2 = Some(t2);
    for attempt in 0..DEMO_MAX_POLL_ATTEMPTS {
        // Периодическое обнаружение взаимоблокировок
        if attempt as u64 % detect_every == 0 {
            if let Some(victim) = db.detect_deadlocks()? {
                let handler = if t1.as_ref().map(|h| h.xid()) == Some(victim) {
                    &mut t1
                } else {
                    &mut t2
                };
                if let Some(mut victim_handler) = handler.take() {
                    let outcome = victim_handler.abort(AbortMode::Deadlock)?;
                    println!("   Координатор назвал жертву {} -> {}", victim, outcome);
                }
            }
        }

        // Опрос заблокированных транзакций
        let mut finished = false;
        for handler in [&mut t1, &mut t2] {
            if let Some(active) = handler.as_mut() {
                if active.is_blocked() {
                    if let Some(result) = active.check_lock()? {
                        println!("   {} check_lock -> {}", active.xid(), result);
                        finished = true;
                    }
                }
            }
        }
        if finished {
            break;
        }

        std::thread::sleep(config.lock_poll_interval());
    }
    println!();

    println!("4. Фиксация выжившей транзакции");
    for handler in [&mut t1, &mut t2] {
        if let Some(mut survivor) = handler.take() {
            let outcome = survivor.commit()?;
            println!("   {} commit -> {}", survivor.xid(), outcome);
        }
    }
    println!();

    println!("5. Итоговое состояние хранилища");
    let mut reader = db.begin_transaction()?;
    for key in ["a", "b"] {
        match reader.perform_get(key)? {
            Some(result) => println!("   GET {} -> {}", key, result),
            None => println!("   GET {} -> заблокировано", key),
        }
    }
    reader.commit()?;

    Ok(())
}
