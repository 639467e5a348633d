//! Wiring: settings + journal path + FX source -> a running desk.

use std::io;
use std::path::Path;
use std::sync::Arc;

use sourcing_core::SourcingDesk;
use sourcing_core::pricing::FxRateSource;

use crate::config::DeskSettings;
use crate::fx::LastKnownGoodFx;
use crate::notify::{NotificationOutbox, QueuedNotifier};
use crate::store::JsonlAllocationJournal;

pub struct DeskRuntime<S> {
    pub desk: SourcingDesk,
    pub journal: Arc<JsonlAllocationJournal>,
    pub fx: Arc<LastKnownGoodFx<S>>,
    pub outbox: NotificationOutbox,
}

/// Open (or create) the journal at `journal_path` and build a desk on it.
///
/// RFQs with history are not registered here; callers restore each one with
/// `SourcingDesk::restore_rfq` once its quotes are loaded.
pub fn open_desk<S: FxRateSource + 'static>(
    settings: &DeskSettings,
    journal_path: impl AsRef<Path>,
    fx_source: S,
) -> io::Result<DeskRuntime<S>> {
    let journal = Arc::new(JsonlAllocationJournal::open(journal_path)?);
    let fx = Arc::new(LastKnownGoodFx::new(fx_source, settings.fx_rate_max_age));
    let (notifier, outbox) = QueuedNotifier::bounded(settings.notification_queue_capacity);

    let desk = SourcingDesk::new(journal.clone(), fx.clone(), settings.finalize.clone())
        .with_notifier(Arc::new(notifier));

    let replay = journal.replay_summary();
    tracing::info!(
        "DeskOpened journal={} rfqs_with_history={} records={}",
        journal.path().display(),
        replay.rfq_ids.len(),
        replay.records_replayed
    );
    Ok(DeskRuntime {
        desk,
        journal,
        fx,
        outbox,
    })
}
