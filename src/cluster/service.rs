use anyhow::Result;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tracing::info;

use super::types::{GossipMessage, Instance, InstanceId, InstanceState};
use super::view::ClusterView;

const GOSSIP_INTERVAL: Duration = Duration::from_millis(500);
const FAILURE_DETECTION_INTERVAL: Duration = Duration::from_secs(2);
const SUSPECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEAD_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MembershipService {
    pub local: Instance,
    pub members: Arc<DashMap<InstanceId, Instance>>,
    socket: Arc<UdpSocket>,
    incarnation: Arc<RwLock<u64>>,
    version: AtomicU64,
}

impl MembershipService {
    /// Binds the gossip socket and announces this instance to the seeds.
    ///
    /// Binding to port 0 is allowed; the advertised gossip address is the one
    /// the OS actually assigned.
    pub async fn new(
        bind_addr: SocketAddr,
        http_addr: SocketAddr,
        stores: Vec<String>,
        seed_nodes: Vec<SocketAddr>,
    ) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(bind_addr).await?;
        let gossip_addr = socket.local_addr()?;

        let local = Instance {
            id: InstanceId::new(),
            gossip_addr,
            http_addr,
            stores,
            state: InstanceState::Alive,
            incarnation: 1,
            last_seen: Some(Instant::now()),
        };

        let members = Arc::new(DashMap::new());
        members.insert(local.id.clone(), local.clone());

        if !seed_nodes.is_empty() {
            info!("Joining cluster via {} seed node(s)", seed_nodes.len());

            let encoded = bincode::serialize(&GossipMessage::Join {
                instance: local.clone(),
            })?;
            for seed in seed_nodes.iter() {
                socket.send_to(&encoded, seed).await?;
                info!("Sent join request to {}", seed);
            }
        }

        Ok(Arc::new(Self {
            local,
            members,
            socket: Arc::new(socket),
            incarnation: Arc::new(RwLock::new(1)),
            version: AtomicU64::new(1),
        }))
    }

    pub async fn start(self: Arc<Self>) {
        tracing::info!("Starting membership service...");

        {
            let service = self.clone();
            tokio::spawn(async move {
                service.gossip_loop().await;
            });
        }

        {
            let service = self.clone();
            tokio::spawn(async move {
                service.receive_loop().await;
            });
        }

        {
            let service = self.clone();
            tokio::spawn(async move {
                service.failure_detection_loop().await;
            });
        }

        tracing::info!("Membership background tasks started");
    }

    pub fn get_alive_members(&self) -> Vec<Instance> {
        self.members
            .iter()
            .filter(|entry| entry.value().state == InstanceState::Alive)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get_member(&self, id: &InstanceId) -> Option<Instance> {
        self.members.get(id).map(|entry| entry.value().clone())
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    async fn local_snapshot(&self) -> Instance {
        let mut me = self.local.clone();
        me.incarnation = *self.incarnation.read().await;
        me
    }

    async fn gossip_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(GOSSIP_INTERVAL);

        loop {
            interval.tick().await;

            // Dead members stay candidates so a healed partition can reconnect.
            let peers: Vec<Instance> = self
                .members
                .iter()
                .filter(|entry| entry.value().id != self.local.id)
                .map(|entry| entry.value().clone())
                .collect();

            if peers.is_empty() {
                continue;
            }

            use rand::Rng;
            let target = &peers[rand::thread_rng().gen_range(0..peers.len())];

            let msg = GossipMessage::Ping {
                sender: self.local_snapshot().await,
            };

            match bincode::serialize(&msg) {
                Ok(encoded) => {
                    if let Err(e) = self.socket.send_to(&encoded, target.gossip_addr).await {
                        tracing::warn!("Failed to send ping to {:?}: {}", target.id, e);
                    } else {
                        tracing::trace!("Sent ping to {:?}", target.id);
                    }
                }
                Err(e) => tracing::error!("Failed to serialize ping: {}", e),
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; 65536];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => match bincode::deserialize::<GossipMessage>(&buf[..len]) {
                    Ok(msg) => {
                        if let Err(e) = self.handle_message(msg, src).await {
                            tracing::error!("Error handling message from {}: {}", src, e);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to deserialize message from {}: {}", src, e);
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to receive UDP packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    pub(crate) async fn handle_message(&self, msg: GossipMessage, src: SocketAddr) -> Result<()> {
        match msg {
            GossipMessage::Ping { sender } => self.handle_ping(sender, src).await,
            GossipMessage::Ack {
                from,
                incarnation,
                members,
            } => {
                self.handle_ack(from, incarnation, members);
                Ok(())
            }
            GossipMessage::Join { instance } => {
                self.handle_join(instance);
                Ok(())
            }
            GossipMessage::Suspect { id, incarnation } => {
                self.handle_suspect(id, incarnation).await;
                Ok(())
            }
            GossipMessage::Alive { id, incarnation } => {
                self.handle_alive(id, incarnation);
                Ok(())
            }
        }
    }

    async fn handle_ping(&self, sender: Instance, src: SocketAddr) -> Result<()> {
        tracing::trace!("Received ping from {:?}", sender.id);

        let from = sender.id.clone();
        self.merge_member(sender);
        self.record_contact(&from, None);

        let all_members: Vec<Instance> = self
            .members
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let reply = GossipMessage::Ack {
            from: self.local.id.clone(),
            incarnation: *self.incarnation.read().await,
            members: all_members,
        };

        let encoded = bincode::serialize(&reply)?;
        self.socket.send_to(&encoded, src).await?;

        Ok(())
    }

    fn handle_ack(&self, from: InstanceId, from_incarnation: u64, members: Vec<Instance>) {
        tracing::trace!(
            "Received ack from {:?} (inc={}) with {} members",
            from,
            from_incarnation,
            members.len()
        );

        self.record_contact(&from, Some(from_incarnation));

        for member in members {
            self.merge_member(member);
        }
    }

    /// Direct contact from `id` proves it is up: refresh `last_seen` and
    /// bring a suspected or dead member back to `Alive`.
    fn record_contact(&self, id: &InstanceId, incarnation: Option<u64>) {
        let mut revived = false;
        if let Some(mut member) = self.members.get_mut(id) {
            member.last_seen = Some(Instant::now());
            if let Some(incarnation) = incarnation
                && incarnation > member.incarnation
            {
                member.incarnation = incarnation;
            }
            if member.state != InstanceState::Alive {
                tracing::info!("Instance {:?} is reachable again ({:?} -> Alive)", id, member.state);
                member.state = InstanceState::Alive;
                revived = true;
            }
        }

        if revived {
            self.bump_version();
        }
    }

    /// Folds a remote view of one member into ours. Our own record is never
    /// overwritten by others; we refute suspicion instead.
    pub(crate) fn merge_member(&self, incoming: Instance) {
        if incoming.id == self.local.id {
            return;
        }

        let mut changed = false;
        match self.members.get_mut(&incoming.id) {
            Some(mut existing) => {
                if incoming.incarnation > existing.incarnation {
                    tracing::debug!(
                        "Updating {:?}: inc {} -> {}",
                        incoming.id,
                        existing.incarnation,
                        incoming.incarnation,
                    );
                    changed = existing.state != incoming.state || existing.stores != incoming.stores;
                    existing.state = incoming.state;
                    existing.incarnation = incoming.incarnation;
                    existing.stores = incoming.stores;
                    existing.http_addr = incoming.http_addr;
                    existing.last_seen = Some(Instant::now());
                } else if incoming.incarnation == existing.incarnation
                    && incoming.state == InstanceState::Alive
                    && existing.state == InstanceState::Suspect
                {
                    tracing::info!("{:?} refuted suspicion", incoming.id);
                    existing.state = InstanceState::Alive;
                    existing.last_seen = Some(Instant::now());
                    changed = true;
                }
            }
            None => {
                tracing::info!(
                    "Discovered new member {:?} (gossip={}, http={})",
                    incoming.id,
                    incoming.gossip_addr,
                    incoming.http_addr
                );
                let mut member = incoming;
                member.last_seen = Some(Instant::now());
                self.members.insert(member.id.clone(), member);
                changed = true;
            }
        }

        if changed {
            self.bump_version();
        }
    }

    async fn handle_suspect(&self, id: InstanceId, incarnation: u64) {
        if id == self.local.id {
            let my_incarnation = {
                let mut inc = self.incarnation.write().await;
                if incarnation < *inc {
                    return;
                }
                *inc = incarnation + 1;
                *inc
            };
            tracing::info!("Refuting suspicion with incarnation {}", my_incarnation);

            if let Some(mut me) = self.members.get_mut(&id) {
                me.incarnation = my_incarnation;
            }
            self.broadcast_message(GossipMessage::Alive {
                id,
                incarnation: my_incarnation,
            })
            .await;
            return;
        }

        let mut changed = false;
        match self.members.get_mut(&id) {
            Some(mut existing) => {
                if incarnation >= existing.incarnation && existing.state == InstanceState::Alive {
                    tracing::info!("Instance {:?} at {} suspected", existing.id, existing.gossip_addr);
                    existing.state = InstanceState::Suspect;
                    existing.incarnation = incarnation;
                    existing.last_seen = Some(Instant::now());
                    changed = true;
                }
            }
            None => tracing::debug!("Suspected instance {:?} is unknown", id),
        }

        if changed {
            self.bump_version();
        }
    }

    fn handle_alive(&self, id: InstanceId, incarnation: u64) {
        let mut changed = false;
        match self.members.get_mut(&id) {
            Some(mut existing) => {
                if incarnation > existing.incarnation
                    || (incarnation == existing.incarnation
                        && existing.state != InstanceState::Alive)
                {
                    tracing::info!(
                        "Instance {:?} at {} is alive (inc={})",
                        existing.id,
                        existing.gossip_addr,
                        incarnation
                    );
                    changed = existing.state != InstanceState::Alive;
                    existing.state = InstanceState::Alive;
                    existing.incarnation = incarnation;
                    existing.last_seen = Some(Instant::now());
                }
            }
            None => tracing::debug!("Alive message for unknown instance {:?}", id),
        }

        if changed {
            self.bump_version();
        }
    }

    fn handle_join(&self, mut instance: Instance) {
        tracing::info!(
            "Instance {:?} joining cluster at {}",
            instance.id,
            instance.gossip_addr
        );

        instance.last_seen = Some(Instant::now());
        self.members.insert(instance.id.clone(), instance);
        self.bump_version();

        tracing::info!("Cluster size now: {}", self.members.len());
    }

    async fn failure_detection_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(FAILURE_DETECTION_INTERVAL);

        loop {
            interval.tick().await;
            let suspicions = self.detect_failures(Instant::now());

            for msg in suspicions {
                self.broadcast_message(msg).await;
            }
        }
    }

    /// One pass of the Alive -> Suspect -> Dead timeout ladder. Returns the
    /// suspicion messages to spread.
    pub(crate) fn detect_failures(&self, now: Instant) -> Vec<GossipMessage> {
        let mut to_broadcast = Vec::new();
        let mut changed = false;

        for mut entry in self.members.iter_mut() {
            let member = entry.value_mut();

            if member.id == self.local.id {
                continue;
            }

            let Some(last_seen) = member.last_seen else {
                member.last_seen = Some(now);
                continue;
            };
            let elapsed = now.saturating_duration_since(last_seen);

            match member.state {
                InstanceState::Alive if elapsed > SUSPECT_TIMEOUT => {
                    tracing::warn!("Instance {:?} suspected (no contact for {:?})", member.id, elapsed);
                    member.state = InstanceState::Suspect;
                    to_broadcast.push(GossipMessage::Suspect {
                        id: member.id.clone(),
                        incarnation: member.incarnation,
                    });
                    changed = true;
                }
                InstanceState::Suspect if elapsed > DEAD_TIMEOUT => {
                    tracing::warn!("Instance {:?} declared dead (no contact for {:?})", member.id, elapsed);
                    member.state = InstanceState::Dead;
                    changed = true;
                }
                _ => {}
            }
        }

        if changed {
            self.bump_version();
        }
        to_broadcast
    }

    async fn broadcast_message(&self, msg: GossipMessage) {
        let Ok(encoded) = bincode::serialize(&msg) else {
            tracing::error!("Failed to serialize broadcast message");
            return;
        };

        let targets: Vec<SocketAddr> = self
            .members
            .iter()
            .filter(|e| e.value().id != self.local.id && e.value().state == InstanceState::Alive)
            .map(|e| e.value().gossip_addr)
            .collect();

        for addr in targets {
            if let Err(e) = self.socket.send_to(&encoded, addr).await {
                tracing::warn!("Failed to broadcast to {}: {}", addr, e);
            }
        }
    }
}

impl ClusterView for MembershipService {
    fn local_id(&self) -> InstanceId {
        self.local.id.clone()
    }

    fn live_instances(&self) -> Vec<Instance> {
        self.get_alive_members()
    }

    fn topology_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn is_settled(&self) -> bool {
        !self
            .members
            .iter()
            .any(|entry| entry.value().state == InstanceState::Suspect)
    }
}
