//! Persistence seam. The tracker and the dashboard only ever see an
//! [`ObligationStore`]; nothing holds a process-wide database handle.

use crate::error::{FinanceError, Result};
use crate::obligation::{Bill, LoanApplication, LoanObligation, Recharge, RecurringObligation};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Records keyed by server-generated id. Each read returns a full snapshot;
/// a failed read is an error, never an empty list.
pub trait ObligationStore {
    fn loans(&self) -> Result<Vec<LoanObligation>>;
    fn recurring(&self) -> Result<Vec<RecurringObligation>>;
    fn bills(&self) -> Result<Vec<Bill>>;
    fn applications(&self) -> Result<Vec<LoanApplication>>;
    fn recharges(&self) -> Result<Vec<Recharge>>;

    fn put_loan(&mut self, loan: LoanObligation) -> Result<()>;
    fn put_recurring(&mut self, obligation: RecurringObligation) -> Result<()>;
    fn put_bill(&mut self, bill: Bill) -> Result<()>;
    fn put_application(&mut self, application: LoanApplication) -> Result<()>;
    fn put_recharge(&mut self, recharge: Recharge) -> Result<()>;

    /// Makes earlier writes durable. Stores without a backing file do nothing.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn loan(&self, id: Uuid) -> Result<LoanObligation> {
        self.loans()?
            .into_iter()
            .find(|l| l.id == id)
            .ok_or_else(|| FinanceError::not_found("loan", id))
    }

    fn recurring_by_id(&self, id: Uuid) -> Result<RecurringObligation> {
        self.recurring()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| FinanceError::not_found("recurring obligation", id))
    }

    fn bill(&self, id: Uuid) -> Result<Bill> {
        self.bills()?
            .into_iter()
            .find(|b| b.id == id)
            .ok_or_else(|| FinanceError::not_found("bill", id))
    }
}

/// In-memory store, optionally snapshotted to a JSON file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStore {
    #[serde(default)]
    loans: BTreeMap<Uuid, LoanObligation>,
    #[serde(default)]
    recurring: BTreeMap<Uuid, RecurringObligation>,
    #[serde(default)]
    bills: BTreeMap<Uuid, Bill>,
    #[serde(default)]
    applications: BTreeMap<Uuid, LoanApplication>,
    #[serde(default)]
    recharges: BTreeMap<Uuid, Recharge>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the snapshot at `path`. A missing file is an empty store that
    /// will be created on the first flush.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut store = if path.exists() {
            let contents = fs::read_to_string(path)
                .map_err(|e| FinanceError::unavailable(&path.display().to_string(), e))?;
            let store: MemoryStore = serde_json::from_str(&contents)
                .map_err(|e| FinanceError::unavailable(&path.display().to_string(), e))?;
            info!(
                "loaded {} loans, {} recurring, {} bills from {}",
                store.loans.len(),
                store.recurring.len(),
                store.bills.len(),
                path.display()
            );
            store
        } else {
            debug!("{} does not exist yet, starting empty", path.display());
            MemoryStore::default()
        };
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Writes the snapshot to `path` via a temporary file and a rename.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| FinanceError::unavailable(&path.display().to_string(), e))?;
        debug!("saved snapshot to {}", path.display());
        Ok(())
    }
}

impl ObligationStore for MemoryStore {
    fn loans(&self) -> Result<Vec<LoanObligation>> {
        Ok(self.loans.values().cloned().collect())
    }

    fn recurring(&self) -> Result<Vec<RecurringObligation>> {
        Ok(self.recurring.values().cloned().collect())
    }

    fn bills(&self) -> Result<Vec<Bill>> {
        Ok(self.bills.values().cloned().collect())
    }

    fn applications(&self) -> Result<Vec<LoanApplication>> {
        Ok(self.applications.values().cloned().collect())
    }

    fn recharges(&self) -> Result<Vec<Recharge>> {
        Ok(self.recharges.values().cloned().collect())
    }

    fn put_loan(&mut self, loan: LoanObligation) -> Result<()> {
        self.loans.insert(loan.id, loan);
        Ok(())
    }

    fn put_recurring(&mut self, obligation: RecurringObligation) -> Result<()> {
        self.recurring.insert(obligation.id, obligation);
        Ok(())
    }

    fn put_bill(&mut self, bill: Bill) -> Result<()> {
        self.bills.insert(bill.id, bill);
        Ok(())
    }

    fn put_application(&mut self, application: LoanApplication) -> Result<()> {
        self.applications.insert(application.id, application);
        Ok(())
    }

    fn put_recharge(&mut self, recharge: Recharge) -> Result<()> {
        self.recharges.insert(recharge.id, recharge);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    fn loan(&self, id: Uuid) -> Result<LoanObligation> {
        self.loans
            .get(&id)
            .cloned()
            .ok_or_else(|| FinanceError::not_found("loan", id))
    }

    fn recurring_by_id(&self, id: Uuid) -> Result<RecurringObligation> {
        self.recurring
            .get(&id)
            .cloned()
            .ok_or_else(|| FinanceError::not_found("recurring obligation", id))
    }

    fn bill(&self, id: Uuid) -> Result<Bill> {
        self.bills
            .get(&id)
            .cloned()
            .ok_or_else(|| FinanceError::not_found("bill", id))
    }
}
