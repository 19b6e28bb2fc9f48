//! Тесты упорядочивания очереди и точности отката

use rand::RngExt;
use rustkv::core::{AbortMode, OperationResult};
use rustkv::{Database, Result};
use std::collections::HashMap;

/// FIFO: запросы предоставляются в порядке постановки в очередь
pub fn test_fifo_grant_order() -> Result<()> {
    let db = Database::new()?;
    let mut writer = db.begin_transaction()?;
    let mut reader1 = db.begin_transaction()?;
    let mut reader2 = db.begin_transaction()?;

    assert_eq!(
        writer.perform_put("k", "1")?,
        Some(OperationResult::Success)
    );
    assert_eq!(reader1.perform_get("k")?, None);
    assert_eq!(reader2.perform_get("k")?, None);

    // Освобождение предоставляет только головной запрос очереди
    writer.commit()?;
    assert_eq!(
        reader1.check_lock()?,
        Some(OperationResult::Value("1".to_string()))
    );
    assert_eq!(reader2.check_lock()?, None);

    // Следующий цикл освобождения доходит до второго читателя
    reader1.commit()?;
    assert_eq!(
        reader2.check_lock()?,
        Some(OperationResult::Value("1".to_string()))
    );
    reader2.commit()?;
    Ok(())
}

/// Единственный читатель повышает блокировку без промежуточного ожидания
pub fn test_upgrade_without_intermediate_block() -> Result<()> {
    let db = Database::new()?;
    let mut txn1 = db.begin_transaction()?;

    assert_eq!(txn1.perform_get("k")?, Some(OperationResult::NoSuchKey));
    assert_eq!(
        txn1.perform_put("k", "1")?,
        Some(OperationResult::Success)
    );
    assert!(!txn1.is_blocked());
    txn1.commit()?;
    Ok(())
}

/// Откат восстанавливает значения до транзакции для всех затронутых ключей
pub fn test_undo_is_exact_inverse() -> Result<()> {
    let db = Database::new()?;
    let mut rng = rand::rng();

    // Исходное состояние хранилища
    let mut before: HashMap<String, String> = HashMap::new();
    let mut seeder = db.begin_transaction()?;
    for i in 0..8 {
        let key = format!("key{}", i);
        let value = format!("{}", rng.random_range(0..1000));
        assert_eq!(
            seeder.perform_put(&key, &value)?,
            Some(OperationResult::Success)
        );
        before.insert(key, value);
    }
    seeder.commit()?;

    // Транзакция перезаписывает часть ключей и добавляет новые, затем отменяется
    let mut txn = db.begin_transaction()?;
    for i in 0..12 {
        let key = format!("key{}", i);
        assert_eq!(
            txn.perform_put(&key, "overwritten")?,
            Some(OperationResult::Success)
        );
    }
    assert_eq!(txn.abort(AbortMode::User)?, OperationResult::UserAbort);

    // Хранилище вернулось к исходному состоянию
    let mut reader = db.begin_transaction()?;
    for i in 0..12 {
        let key = format!("key{}", i);
        let expected = match before.get(&key) {
            Some(value) => OperationResult::Value(value.clone()),
            None => OperationResult::NoSuchKey,
        };
        assert_eq!(reader.perform_get(&key)?, Some(expected));
    }
    reader.commit()?;
    Ok(())
}
