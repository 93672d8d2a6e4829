use {
    crate::StoreError,
    async_trait::async_trait,
    data_encoding::HEXLOWER,
    renvm_types::{Deposit, Hash256, HashExt, Transfer, TxRef},
    serde::{Deserialize, Serialize},
    std::{
        collections::BTreeMap,
        io::ErrorKind,
        path::{Path, PathBuf},
        sync::{Mutex, PoisonError},
    },
};

/// What's persisted for each deposit of a gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub ghash: Hash256,
    pub deposit: Deposit,
    pub transfer: Transfer,
}

impl TransferRecord {
    pub fn reference(&self) -> TxRef {
        self.deposit.reference()
    }
}

/// Durable record of every transfer, keyed by gateway hash and deposit.
///
/// The engine writes a record after every transition and reads all records
/// of a gateway back when it's reopened.
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Insert or replace the record for `(record.ghash, record.reference())`.
    async fn save(&self, record: &TransferRecord) -> Result<(), StoreError>;

    /// All records of a gateway, oldest deposit first.
    async fn load(&self, ghash: &Hash256) -> Result<Vec<TransferRecord>, StoreError>;
}

fn sort_by_detection(records: &mut [TransferRecord]) {
    records.sort_by(|a, b| {
        a.deposit
            .detected_at
            .cmp(&b.deposit.detected_at)
            .then_with(|| a.reference().cmp(&b.reference()))
    });
}

// ---------------------------------- memory -----------------------------------

#[derive(Debug, Default)]
pub struct MemoryTransferStore {
    records: Mutex<BTreeMap<(Hash256, TxRef), TransferRecord>>,
}

impl MemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferStore for MemoryTransferStore {
    async fn save(&self, record: &TransferRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((record.ghash, record.reference()), record.clone());

        Ok(())
    }

    async fn load(&self, ghash: &Hash256) -> Result<Vec<TransferRecord>, StoreError> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((g, _), _)| g == ghash)
            .map(|(_, record)| record.clone())
            .collect::<Vec<_>>();

        sort_by_detection(&mut records);

        Ok(records)
    }
}

// ----------------------------------- file ------------------------------------

/// Stores each record as a JSON file under `<root>/<ghash>/`.
///
/// Writes go to a temporary file which is then renamed over the old record,
/// so a crash never leaves a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileTransferStore {
    root: PathBuf,
}

impl FileTransferStore {
    pub fn new<P>(root: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn gateway_dir(&self, ghash: &Hash256) -> PathBuf {
        self.root.join(HEXLOWER.encode(ghash.as_ref()))
    }

    fn record_path(&self, record: &TransferRecord) -> PathBuf {
        // Deposit references contain arbitrary bytes; hash them into a
        // filesystem-safe name.
        let name = record.reference().to_string().keccak256();
        self.gateway_dir(&record.ghash)
            .join(format!("{}.json", HEXLOWER.encode(name.as_ref())))
    }
}

#[async_trait]
impl TransferStore for FileTransferStore {
    async fn save(&self, record: &TransferRecord) -> Result<(), StoreError> {
        let path = self.record_path(record);
        let tmp = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(self.gateway_dir(&record.ghash)).await?;
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(record)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        Ok(())
    }

    async fn load(&self, ghash: &Hash256) -> Result<Vec<TransferRecord>, StoreError> {
        let mut entries = match tokio::fs::read_dir(self.gateway_dir(ghash)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };

        let mut records = vec![];
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let bytes = tokio::fs::read(&path).await?;
                records.push(serde_json::from_slice(&bytes)?);
            }
        }

        sort_by_detection(&mut records);

        Ok(records)
    }
}

// ----------------------------------- tests -----------------------------------
