//! Сквозные сценарии протокола транзакций
//!
//! Каждый сценарий проходит полный путь драйвера: запросы, сигнал
//! блокировки, опрос check_lock, фиксация/отмена и координатор.

use rustkv::core::{AbortMode, OperationResult};
use rustkv::{Database, Result};

/// Чтение, заблокированное чужой записью, возобновляется после фиксации
pub fn test_blocked_read_resumes_after_commit() -> Result<()> {
    let db = Database::new()?;
    let mut txn1 = db.begin_transaction()?;
    let mut txn2 = db.begin_transaction()?;

    assert_eq!(
        txn1.perform_put("a", "1")?,
        Some(OperationResult::Success)
    );

    // T1 удерживает Exclusive: чтение T2 блокируется
    assert_eq!(txn2.perform_get("a")?, None);
    assert_eq!(txn2.check_lock()?, None);

    txn1.commit()?;
    assert_eq!(
        txn2.check_lock()?,
        Some(OperationResult::Value("1".to_string()))
    );
    txn2.commit()?;
    Ok(())
}

/// Чтение пустого хранилища, запись и повторное чтение в одной транзакции
pub fn test_read_write_read() -> Result<()> {
    let db = Database::new()?;
    let mut txn1 = db.begin_transaction()?;

    assert_eq!(txn1.perform_get("a")?, Some(OperationResult::NoSuchKey));
    assert_eq!(
        txn1.perform_put("a", "5")?,
        Some(OperationResult::Success)
    );
    assert_eq!(
        txn1.perform_get("a")?,
        Some(OperationResult::Value("5".to_string()))
    );
    txn1.commit()?;
    Ok(())
}

/// Повышение блокировки ждет ухода второго читателя
pub fn test_shared_readers_then_upgrade() -> Result<()> {
    let db = Database::new()?;
    let mut txn1 = db.begin_transaction()?;
    let mut txn2 = db.begin_transaction()?;

    assert_eq!(txn1.perform_get("a")?, Some(OperationResult::NoSuchKey));
    assert_eq!(txn2.perform_get("a")?, Some(OperationResult::NoSuchKey));

    // Upgrade заблокирован, пока T2 удерживает Shared
    assert_eq!(txn1.perform_put("a", "9")?, None);
    assert_eq!(txn1.check_lock()?, None);

    txn2.commit()?;
    assert_eq!(txn1.check_lock()?, Some(OperationResult::Success));

    assert_eq!(
        txn1.perform_get("a")?,
        Some(OperationResult::Value("9".to_string()))
    );
    txn1.commit()?;
    Ok(())
}

/// Перекрестное ожидание обнаруживается, отмена жертвы разблокирует выжившего
pub fn test_deadlock_detection_and_recovery() -> Result<()> {
    let db = Database::new()?;
    let mut txn1 = db.begin_transaction()?;
    let mut txn2 = db.begin_transaction()?;

    assert_eq!(
        txn1.perform_put("a", "1")?,
        Some(OperationResult::Success)
    );
    assert_eq!(
        txn2.perform_put("b", "2")?,
        Some(OperationResult::Success)
    );
    assert_eq!(txn1.perform_get("b")?, None);
    assert_eq!(txn2.perform_get("a")?, None);

    // Жертва: минимальный идентификатор в цикле
    let victim = db.detect_deadlocks()?;
    assert_eq!(victim, Some(txn1.xid()));

    assert_eq!(
        txn1.abort(AbortMode::Deadlock)?,
        OperationResult::DeadlockAbort
    );
    assert_eq!(db.detect_deadlocks()?, None);

    // Запись жертвы откатилась, выживший видит отсутствие ключа
    assert_eq!(txn2.check_lock()?, Some(OperationResult::NoSuchKey));
    txn2.commit()?;
    Ok(())
}

/// Отмена клиентом полностью отменяет изменения транзакции
pub fn test_user_abort_restores_store() -> Result<()> {
    let db = Database::new()?;
    let mut txn1 = db.begin_transaction()?;

    assert_eq!(
        txn1.perform_put("a", "1")?,
        Some(OperationResult::Success)
    );
    assert_eq!(txn1.abort(AbortMode::User)?, OperationResult::UserAbort);

    let mut txn2 = db.begin_transaction()?;
    assert_eq!(txn2.perform_get("a")?, Some(OperationResult::NoSuchKey));
    txn2.commit()?;
    Ok(())
}
