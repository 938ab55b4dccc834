//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `wallets` - One record per user (key: user id)
//! - `transactions` - Append-only trail (key: user id length (u32 BE) || user id || tx_id)
//! - `payment_refs` - Applied payment references (key: reference, value: tx_id)
//!
//! Transaction keys carry the user id length so that ids sharing a
//! byte prefix (user ids are opaque, externally issued strings) can
//! never alias each other's trail scans.
//!
//! A balance mutation commits the wallet record, its transaction
//! record, and (for credits) the payment-reference marker in a single
//! `WriteBatch`, so a mutation is either fully applied or absent.
//! There is no public way to write a balance without its transaction.

use crate::{
    error::{Error, Result},
    types::{UserId, Wallet, WalletTransaction},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_WALLETS: &str = "wallets";
const CF_TRANSACTIONS: &str = "transactions";
const CF_PAYMENT_REFS: &str = "payment_refs";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        // Column family descriptors
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_wallets()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_PAYMENT_REFS, Self::cf_options_payment_refs()),
        ];

        // Open database
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?} with 3 column families", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_wallets() -> Options {
        let mut opts = Options::default();
        // Wallets are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_payment_refs() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups only, bloom filters pay off
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Wallet operations

    /// Get wallet record, `None` if the user has never transacted
    pub fn get_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        let cf = self.cf_handle(CF_WALLETS)?;

        match self.db.get_cf(cf, user_id.as_bytes())? {
            Some(value) => {
                let wallet: Wallet = bincode::deserialize(&value)?;
                Ok(Some(wallet))
            }
            None => Ok(None),
        }
    }

    /// Apply a debit: wallet record and transaction committed atomically
    pub fn apply_debit(&self, wallet: &Wallet, tx: &WalletTransaction) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        batch.put_cf(cf_wallets, wallet.user_id.as_bytes(), bincode::serialize(wallet)?);

        let cf_txs = self.cf_handle(CF_TRANSACTIONS)?;
        let tx_key = Self::tx_key(&tx.user_id, tx.tx_id);
        batch.put_cf(cf_txs, &tx_key, bincode::serialize(tx)?);

        self.db.write(batch)?;

        tracing::debug!(
            user_id = %wallet.user_id,
            tx_id = %tx.tx_id,
            delta = tx.delta,
            new_balance = wallet.balance,
            "Debit applied"
        );

        Ok(())
    }

    /// Apply a credit: wallet record, transaction, and the
    /// payment-reference marker committed atomically
    pub fn apply_credit(
        &self,
        wallet: &Wallet,
        tx: &WalletTransaction,
        payment_reference: &str,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        batch.put_cf(cf_wallets, wallet.user_id.as_bytes(), bincode::serialize(wallet)?);

        let cf_txs = self.cf_handle(CF_TRANSACTIONS)?;
        let tx_key = Self::tx_key(&tx.user_id, tx.tx_id);
        batch.put_cf(cf_txs, &tx_key, bincode::serialize(tx)?);

        let cf_refs = self.cf_handle(CF_PAYMENT_REFS)?;
        batch.put_cf(cf_refs, payment_reference.as_bytes(), tx.tx_id.as_bytes());

        self.db.write(batch)?;

        tracing::info!(
            user_id = %wallet.user_id,
            tx_id = %tx.tx_id,
            delta = tx.delta,
            new_balance = wallet.balance,
            payment_reference,
            "Credit applied"
        );

        Ok(())
    }

    /// Look up a payment reference, returning the transaction that applied it
    pub fn lookup_payment_reference(&self, payment_reference: &str) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_PAYMENT_REFS)?;

        match self.db.get_cf(cf, payment_reference.as_bytes())? {
            Some(value) => {
                let bytes: [u8; 16] = value
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt payment reference marker".to_string()))?;
                Ok(Some(Uuid::from_bytes(bytes)))
            }
            None => Ok(None),
        }
    }

    /// Get transactions for a user, oldest first (UUIDv7 keys sort by time)
    pub fn get_transactions(&self, user_id: &UserId) -> Result<Vec<WalletTransaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let prefix = Self::tx_key_prefix(user_id);

        let iter = self.db.prefix_iterator_cf(cf, &prefix);

        let mut transactions = Vec::new();
        for item in iter {
            let (key, value) = item?;

            // Prefix iterator may run past the prefix boundary
            if !key.starts_with(&prefix) {
                break;
            }

            let tx: WalletTransaction = bincode::deserialize(&value)?;
            transactions.push(tx);
        }

        Ok(transactions)
    }

    // Key helpers

    /// Length-prefixed user id: `"a"` and `"a|b"` produce prefixes
    /// that cannot be extensions of one another
    fn tx_key_prefix(user_id: &UserId) -> Vec<u8> {
        let id = user_id.as_bytes();
        let mut key = Vec::with_capacity(4 + id.len());
        key.extend_from_slice(&(id.len() as u32).to_be_bytes());
        key.extend_from_slice(id);
        key
    }

    fn tx_key(user_id: &UserId, tx_id: Uuid) -> Vec<u8> {
        let mut key = Self::tx_key_prefix(user_id);
        key.extend_from_slice(tx_id.as_bytes());
        key
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        let cf_txs = self.cf_handle(CF_TRANSACTIONS)?;

        let wallet_count = self.approximate_count(cf_wallets)?;
        let transaction_count = self.approximate_count(cf_txs)?;

        // Count applied payment references exactly (small CF)
        let cf_refs = self.cf_handle(CF_PAYMENT_REFS)?;
        let mut payment_reference_count = 0u64;
        let iter = self.db.iterator_cf(cf_refs, IteratorMode::Start);
        for item in iter {
            item?;
            payment_reference_count += 1;
        }

        Ok(StorageStats {
            total_wallets: wallet_count,
            total_transactions: transaction_count,
            total_payment_references: payment_reference_count,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        // RocksDB property for approximate count
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Number of wallet records (approximate)
    pub total_wallets: u64,
    /// Number of transaction records (approximate)
    pub total_transactions: u64,
    /// Number of applied payment references (exact)
    pub total_payment_references: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reason;
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn test_wallet(user: &str, balance: u64) -> Wallet {
        Wallet {
            user_id: UserId::new(user),
            balance,
            last_transaction_at: Utc::now(),
            last_reason: Reason::PaymentCredit,
        }
    }

    fn test_tx(user: &str, delta: i64, reference: Option<&str>) -> WalletTransaction {
        WalletTransaction {
            tx_id: Uuid::now_v7(),
            user_id: UserId::new(user),
            delta,
            reason: if delta >= 0 {
                Reason::PaymentCredit
            } else {
                Reason::FullAnalysis
            },
            timestamp: Utc::now(),
            payment_reference: reference.map(String::from),
        }
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_WALLETS).is_some());
        assert!(storage.db.cf_handle(CF_TRANSACTIONS).is_some());
        assert!(storage.db.cf_handle(CF_PAYMENT_REFS).is_some());
    }

    #[test]
    fn test_missing_wallet_is_none() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let wallet = storage.get_wallet(&UserId::new("nobody")).unwrap();
        assert!(wallet.is_none());
    }

    #[test]
    fn test_apply_debit_persists_wallet_and_transaction() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let wallet = test_wallet("u1", 90);
        let tx = test_tx("u1", -10, None);

        storage.apply_debit(&wallet, &tx).unwrap();

        let retrieved = storage.get_wallet(&UserId::new("u1")).unwrap().unwrap();
        assert_eq!(retrieved.balance, 90);

        let txs = storage.get_transactions(&UserId::new("u1")).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].delta, -10);
    }

    #[test]
    fn test_apply_credit_marks_payment_reference() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let wallet = test_wallet("u1", 100);
        let tx = test_tx("u1", 100, Some("pay_abc"));

        storage.apply_credit(&wallet, &tx, "pay_abc").unwrap();

        let marker = storage.lookup_payment_reference("pay_abc").unwrap();
        assert_eq!(marker, Some(tx.tx_id));

        assert!(storage.lookup_payment_reference("pay_xyz").unwrap().is_none());
    }

    #[test]
    fn test_transactions_are_time_ordered() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        for i in 1..=3 {
            let wallet = test_wallet("u1", 100 - i * 10);
            let tx = test_tx("u1", -10, None);
            storage.apply_debit(&wallet, &tx).unwrap();
            // UUIDv7 keys only order across distinct milliseconds
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let txs = storage.get_transactions(&UserId::new("u1")).unwrap();
        assert_eq!(txs.len(), 3);
        for window in txs.windows(2) {
            assert!(window[0].timestamp <= window[1].timestamp);
        }
    }

    #[test]
    fn test_transactions_isolated_per_user() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        storage
            .apply_debit(&test_wallet("u1", 0), &test_tx("u1", -10, None))
            .unwrap();
        storage
            .apply_debit(&test_wallet("u1x", 0), &test_tx("u1x", -5, None))
            .unwrap();

        // "u1" must not pick up "u1x" records despite the shared prefix
        let txs = storage.get_transactions(&UserId::new("u1")).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].delta, -10);
    }

    #[test]
    fn test_transactions_isolated_despite_embedded_separator() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        // User ids are opaque strings; "a|b"'s trail must not be
        // visible to "a" whatever bytes the ids contain
        storage
            .apply_credit(&test_wallet("a", 100), &test_tx("a", 100, Some("pay_a")), "pay_a")
            .unwrap();
        storage
            .apply_credit(
                &test_wallet("a|b", 7),
                &test_tx("a|b", 7, Some("pay_ab")),
                "pay_ab",
            )
            .unwrap();

        let txs = storage.get_transactions(&UserId::new("a")).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].delta, 100);

        let txs = storage.get_transactions(&UserId::new("a|b")).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].delta, 7);
    }

    #[test]
    fn test_stats() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let wallet = test_wallet("u1", 50);
        let tx = test_tx("u1", 50, Some("pay_1"));
        storage.apply_credit(&wallet, &tx, "pay_1").unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.total_payment_references, 1);
    }
}
