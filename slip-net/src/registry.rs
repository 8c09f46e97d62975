//! Link startup and the table of running links.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{mpsc, Mutex};
use std::thread;

use crate::config::LinkConfig;
use crate::error::Error;
use crate::gate;
use crate::link::{lock, LinkHandle, LinkId};
use crate::rx::RxTask;
use crate::serial::SerialPort;
use crate::stack::NetworkStack;
use crate::tx::TxTask;

/// Open the serial port named in `config` and start a link on it.
pub fn start<S>(id: LinkId, config: &LinkConfig, stack: S) -> Result<LinkHandle, Error>
where
    S: NetworkStack + 'static,
{
    config.validate()?;
    // An error past this point drops whatever was already opened
    let port = SerialPort::open(&config.serial_config())?;
    let reader = port.reader()?;
    let writer = port.writer()?;
    // The two duplicates keep the device open once `port` is dropped
    start_with_io(id, config, reader, writer, stack)
}

/// Start a link over an arbitrary byte stream pair.
///
/// Spawns `slip-rx-<id>` and `slip-tx-<id>`. The stack is attached before
/// either thread runs. If a thread can't be spawned, `reader` and `writer`
/// are dropped before the error is returned.
pub fn start_with_io<R, W, S>(
    id: LinkId,
    config: &LinkConfig,
    reader: R,
    writer: W,
    mut stack: S,
) -> Result<LinkHandle, Error>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
    S: NetworkStack + 'static,
{
    config.validate()?;

    let link = LinkHandle::new(id, config);
    stack.attach(link.clone());
    let gate = gate::shared(stack, writer);

    // The receive thread holds off until both threads exist. Dropping `go`
    // without sending releases it, and its reader with it.
    let (go, wait) = mpsc::channel::<()>();
    let rx = RxTask::new(link.clone(), reader, gate.clone());
    thread::Builder::new()
        .name(format!("slip-rx-{}", id.0))
        .spawn(move || {
            if wait.recv().is_ok() {
                rx.run();
            }
        })
        .map_err(Error::Spawn)?;

    let tx = TxTask::new(link.clone(), gate);
    thread::Builder::new()
        .name(format!("slip-tx-{}", id.0))
        .spawn(move || tx.run())
        .map_err(Error::Spawn)?;

    let _ = go.send(());
    log::info!(
        "[{}] link {} started (mtu {}, poll every {:?})",
        link.name(),
        id.0,
        link.mtu(),
        link.poll_interval()
    );
    Ok(link)
}

/// Running links, keyed by id.
#[derive(Debug, Default)]
pub struct Registry {
    links: Mutex<HashMap<LinkId, LinkHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Open the configured serial port and start link `id` on it.
    pub fn initialize<S>(
        &self,
        id: LinkId,
        config: &LinkConfig,
        stack: S,
    ) -> Result<LinkHandle, Error>
    where
        S: NetworkStack + 'static,
    {
        self.insert_with(id, || start(id, config, stack))
    }

    /// Like [`Registry::initialize`], over a caller-provided stream pair.
    pub fn initialize_with_io<R, W, S>(
        &self,
        id: LinkId,
        config: &LinkConfig,
        reader: R,
        writer: W,
        stack: S,
    ) -> Result<LinkHandle, Error>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        S: NetworkStack + 'static,
    {
        self.insert_with(id, || start_with_io(id, config, reader, writer, stack))
    }

    fn insert_with<F>(&self, id: LinkId, start: F) -> Result<LinkHandle, Error>
    where
        F: FnOnce() -> Result<LinkHandle, Error>,
    {
        // Held across startup so two callers can't race for the same id
        let mut links = lock(&self.links);
        if links.contains_key(&id) {
            return Err(Error::AlreadyInitialized(id));
        }
        let link = start()?;
        links.insert(id, link.clone());
        Ok(link)
    }

    pub fn get(&self, id: LinkId) -> Option<LinkHandle> {
        lock(&self.links).get(&id).cloned()
    }

    /// Ids of all running links, in ascending order.
    pub fn ids(&self) -> Vec<LinkId> {
        let mut ids: Vec<LinkId> = lock(&self.links).keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        lock(&self.links).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.links).is_empty()
    }
}
