use std::{collections::HashMap, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};

type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

const RESPAWN_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_DOUBLINGS: u32 = 5;

/// Heartbeat-based actor supervisor.
///
/// Each registered factory builds a fresh actor whenever the previous
/// incarnation stops heartbeating, after a per-actor backoff that doubles
/// up to a cap. A respawned feed re-runs its reconciliation pass, so a
/// restart never loses backlog.
pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    ids: HashMap<Uuid, ActorType>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
    restarts: HashMap<ActorType, u32>,
    respawn_due: HashMap<ActorType, Instant>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            actor_factories: HashMap::new(),
            ids: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            restarts: HashMap::new(),
            respawn_due: HashMap::new(),
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    pub async fn start(&mut self) {
        let mut check_interval = time::interval(Duration::from_secs(1));
        let timeout_duration = Duration::from_secs(3);

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor in actors {
            self.spawn_actor(actor, supervisor_tx.clone());
        }

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(id) => {
                            // Ignore heartbeats from incarnations we already
                            // replaced.
                            if let Some(&actor_type) = self.ids.get(&id) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(id) => {
                            if let Some(actor_type) = self.ids.remove(&id) {
                                warn!("{:?} is shutting down gracefully.", actor_type);
                                self.pulses.remove(&actor_type);
                                if let Some(handle) = self.handles.remove(&actor_type) {
                                    handle.abort();
                                }
                            }
                        }
                        ControlMessage::Error(id, error_msg) => {
                            if let Some(&actor_type) = self.ids.get(&id) {
                                error!("Actor {:?} reported error: {}", actor_type, error_msg);
                            }
                        }
                    }
                }

                _ = check_interval.tick() => {
                    let now = Instant::now();
                    let dead_timeout = now - timeout_duration;

                    let dead: Vec<ActorType> = self
                        .pulses
                        .iter()
                        .filter(|&(_, &pulse)| pulse < dead_timeout)
                        .map(|(&actor_type, _)| actor_type)
                        .collect();

                    for actor_type in dead {
                        let count = self.restarts.entry(actor_type).or_insert(0);
                        *count += 1;
                        let backoff = Duration::from_millis(
                            RESPAWN_BACKOFF_MS << (*count - 1).min(MAX_BACKOFF_DOUBLINGS),
                        );
                        warn!(
                            "{:?} is unresponsive, respawn #{} in {:?}",
                            actor_type, count, backoff
                        );

                        if let Some(handle) = self.handles.remove(&actor_type) {
                            handle.abort();
                        }
                        self.pulses.remove(&actor_type);
                        self.ids.retain(|_, t| *t != actor_type);
                        self.respawn_due.insert(actor_type, now + backoff);
                    }

                    let due: Vec<ActorType> = self
                        .respawn_due
                        .iter()
                        .filter(|&(_, &at)| at <= now)
                        .map(|(&actor_type, _)| actor_type)
                        .collect();

                    for actor_type in due {
                        self.respawn_due.remove(&actor_type);
                        self.spawn_actor(actor_type, supervisor_tx.clone());
                    }
                }
            }
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let mut new_actor = self.actor_factories[&actor_type]();
        let id = new_actor.id();
        info!("Spawning {:?} ({})", actor_type, id);

        let handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {:?} stopped: {}", actor_type, e);
            }
        });
        self.ids.insert(id, actor_type);
        self.handles.insert(actor_type, handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}
