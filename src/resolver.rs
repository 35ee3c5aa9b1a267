use crate::context::RenderContext;
use crate::node::{self, InlineNode};
use crate::provider::ImageProvider;
use image::DynamicImage;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use url::Url;

/// Resolved images keyed by their raw source string. A missing key means
/// "not resolved", whether still in flight, skipped, or failed.
pub type ImageTable = HashMap<String, Arc<DynamicImage>>;

struct Batch {
    generation: u64,
    table: ImageTable,
}

enum Pending {
    Idle,
    /// Result available without waiting (sequences with no images).
    Ready(Batch),
    InFlight(Receiver<Batch>),
}

/// Resolves the unique image references of one inline sequence at a time.
///
/// Each `request` supersedes the previous one: the generation token
/// advances and anything still in flight for an older generation is
/// discarded on arrival, never merged. Fetches for one batch run
/// concurrently; the table publishes wholesale once all of them settle,
/// with failed entries absent.
pub struct ImageResolver {
    provider: Arc<dyn ImageProvider>,
    generation: u64,
    pending: Pending,
}

impl ImageResolver {
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        Self {
            provider,
            generation: 0,
            pending: Pending::Idle,
        }
    }

    /// Start resolving the images of `nodes`, superseding any in-flight
    /// request. Completion is observed through [`poll`](Self::poll).
    pub fn request(&mut self, nodes: &[InlineNode], context: &RenderContext) {
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;

        let images = node::unique_images(nodes);
        if images.is_empty() {
            self.pending = Pending::Ready(Batch {
                generation,
                table: ImageTable::new(),
            });
            return;
        }

        let targets: Vec<(String, String, Url)> = images
            .iter()
            .filter_map(|data| {
                let url = context.resolve_image_url(&data.source)?;
                Some((data.source.clone(), data.alt.clone(), url))
            })
            .collect();
        if targets.len() < images.len() {
            debug!(
                "skipping {} image reference(s) with unresolvable URLs",
                images.len() - targets.len()
            );
        }

        debug!(
            "resolving {} unique image(s) for generation {generation}",
            targets.len()
        );
        let provider = Arc::clone(&self.provider);
        let (batch_tx, batch_rx) = mpsc::channel();
        thread::spawn(move || {
            let (tx, rx) = mpsc::channel();
            let launched = targets.len();
            for (source, alt, url) in targets {
                let tx = tx.clone();
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    let result = provider.fetch(&url, &alt);
                    let _ = tx.send((source, result));
                });
            }
            drop(tx);

            let mut table = ImageTable::new();
            for _ in 0..launched {
                match rx.recv() {
                    Ok((source, Ok(image))) => {
                        table.insert(source, Arc::new(image));
                    }
                    Ok((source, Err(error))) => {
                        warn!("image fetch failed for {source}: {error}");
                    }
                    Err(_) => break,
                }
            }
            // Receiver may be gone if a newer request superseded this one
            let _ = batch_tx.send(Batch { generation, table });
        });
        self.pending = Pending::InFlight(batch_rx);
    }

    /// Non-blocking completion check. Returns the finished table once per
    /// request; stale batches from superseded generations are dropped.
    pub fn poll(&mut self) -> Option<ImageTable> {
        match std::mem::replace(&mut self.pending, Pending::Idle) {
            Pending::Idle => None,
            Pending::Ready(batch) => self.accept(batch),
            Pending::InFlight(rx) => match rx.try_recv() {
                Ok(batch) => self.accept(batch),
                Err(TryRecvError::Empty) => {
                    self.pending = Pending::InFlight(rx);
                    None
                }
                Err(TryRecvError::Disconnected) => {
                    warn!("image resolution worker vanished before delivering");
                    None
                }
            },
        }
    }

    /// Block until the in-flight batch lands. None when idle or when the
    /// delivered batch turned out stale.
    pub fn wait(&mut self) -> Option<ImageTable> {
        match std::mem::replace(&mut self.pending, Pending::Idle) {
            Pending::Idle => None,
            Pending::Ready(batch) => self.accept(batch),
            Pending::InFlight(rx) => match rx.recv() {
                Ok(batch) => self.accept(batch),
                Err(_) => {
                    warn!("image resolution worker vanished before delivering");
                    None
                }
            },
        }
    }

    /// Resolve and wait for the whole batch. Sequences without images
    /// return an empty table without touching the provider.
    pub fn resolve_blocking(
        &mut self,
        nodes: &[InlineNode],
        context: &RenderContext,
    ) -> ImageTable {
        self.request(nodes, context);
        self.wait().unwrap_or_default()
    }

    /// Drop interest in any in-flight resolution. Provider calls already
    /// running are not interrupted; their results are discarded.
    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Pending::Idle;
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self.pending, Pending::Idle)
    }

    fn accept(&mut self, batch: Batch) -> Option<ImageTable> {
        if batch.generation == self.generation {
            debug!(
                "image batch ready: {} entry(ies) for generation {}",
                batch.table.len(),
                batch.generation
            );
            Some(batch.table)
        } else {
            debug!(
                "dropping stale image batch for generation {} (current {})",
                batch.generation, self.generation
            );
            None
        }
    }
}
