use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::model::Invoice;

/// Local index from normalized `r_hash` to invoice.
///
/// Contents are only ever swapped as a whole, so readers see either the previous or the
/// new snapshot.
#[derive(Default, Debug, Clone)]
pub struct InvoiceCache {
    invoices: Arc<RwLock<HashMap<String, Invoice>>>,
}

impl InvoiceCache {
    /// Swaps in a new snapshot, returning its size.
    pub async fn replace(&self, invoices: Vec<Invoice>) -> usize {
        let snapshot = invoices
            .into_iter()
            .map(|invoice| (invoice.r_hash.clone(), invoice))
            .collect::<HashMap<_, _>>();
        let count = snapshot.len();
        *self.invoices.write().await = snapshot;
        count
    }

    pub async fn get(&self, r_hash: &str) -> Option<Invoice> {
        self.invoices.read().await.get(r_hash).cloned()
    }
}
