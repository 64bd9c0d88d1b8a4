//! The workload metadata model.
//!
//! Everything tracked by the store is an [`Entity`]: a container, a
//! Kubernetes pod, or an ECS task. Entities are identified by an
//! [`EntityID`], a `(Kind, id)` pair that is globally unique per kind and
//! serves as the store's composite map key.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

mod image;

pub use image::ContainerImage;

/// The kind of a tracked workload entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Kind {
    Container,
    KubernetesPod,
    ECSTask,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Container => f.write_str("container"),
            Kind::KubernetesPod => f.write_str("kubernetes_pod"),
            Kind::ECSTask => f.write_str("ecs_task"),
        }
    }
}

/// Unique identity of an [`Entity`], used as the store's composite key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EntityID {
    pub kind: Kind,
    pub id: String,
}

impl EntityID {
    pub fn new(kind: Kind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Metadata common to every entity variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityMeta {
    pub name: String,
    pub namespace: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
}

/// One tracked workload object.
///
/// Consumers discriminate on the variant (or on [`Entity::kind`]) before
/// accessing variant-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Entity {
    Container(Container),
    KubernetesPod(KubernetesPod),
    ECSTask(ECSTask),
}

impl Entity {
    /// Returns the identity of the entity, regardless of variant.
    pub fn id(&self) -> &EntityID {
        match self {
            Entity::Container(c) => &c.id,
            Entity::KubernetesPod(p) => &p.id,
            Entity::ECSTask(t) => &t.id,
        }
    }

    pub fn kind(&self) -> Kind {
        self.id().kind
    }

    pub fn meta(&self) -> &EntityMeta {
        match self {
            Entity::Container(c) => &c.meta,
            Entity::KubernetesPod(p) => &p.meta,
            Entity::ECSTask(t) => &t.meta,
        }
    }
}

/// Metadata about a single container.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Container {
    pub id: EntityID,
    pub meta: EntityMeta,
    pub image: ContainerImage,
    pub env: HashMap<String, String>,
    pub ports: Vec<ContainerPort>,
    pub runtime: ContainerRuntime,
    pub state: ContainerState,
}

impl Container {
    /// Creates an empty container record for the given raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: EntityID::new(Kind::Container, id),
            meta: EntityMeta::default(),
            image: ContainerImage::default(),
            env: HashMap::default(),
            ports: Vec::default(),
            runtime: ContainerRuntime::default(),
            state: ContainerState::default(),
        }
    }
}

/// A named port exposed by a container.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContainerPort {
    pub name: String,
    pub port: u16,
}

/// The runtime a container was created by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ContainerRuntime {
    Docker,
    Containerd,
    Podman,
    CriO,
    #[default]
    Unknown,
}

impl FromStr for ContainerRuntime {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "docker" => ContainerRuntime::Docker,
            "containerd" => ContainerRuntime::Containerd,
            "podman" => ContainerRuntime::Podman,
            "cri-o" | "crio" => ContainerRuntime::CriO,
            _ => ContainerRuntime::Unknown,
        })
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRuntime::Docker => f.write_str("docker"),
            ContainerRuntime::Containerd => f.write_str("containerd"),
            ContainerRuntime::Podman => f.write_str("podman"),
            ContainerRuntime::CriO => f.write_str("cri-o"),
            ContainerRuntime::Unknown => f.write_str("unknown"),
        }
    }
}

/// Running/terminated state of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContainerState {
    pub running: bool,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
}

/// Metadata about a Kubernetes pod.
///
/// `containers` holds the raw ids of the pod's member containers. These are
/// weak references: resolving one through the store may legitimately fail
/// with `NotFound` if the container already expired.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KubernetesPod {
    pub id: EntityID,
    pub meta: EntityMeta,
    pub owners: Vec<KubernetesPodOwner>,
    pub persistent_volume_claim_names: Vec<String>,
    pub containers: Vec<String>,
    pub ready: bool,
    pub phase: String,
    pub ip: String,
}

impl KubernetesPod {
    /// Creates an empty pod record for the given UID.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            id: EntityID::new(Kind::KubernetesPod, uid),
            meta: EntityMeta::default(),
            owners: Vec::default(),
            persistent_volume_claim_names: Vec::default(),
            containers: Vec::default(),
            ready: false,
            phase: String::new(),
            ip: String::new(),
        }
    }
}

/// An owner reference of a Kubernetes pod, e.g. a ReplicaSet or DaemonSet.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KubernetesPodOwner {
    pub kind: String,
    pub name: String,
    pub id: String,
}

/// Metadata about an ECS task.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ECSTask {
    pub id: EntityID,
    pub meta: EntityMeta,
    pub cluster_name: String,
    pub family: String,
    pub version: String,
    pub launch_type: ECSLaunchType,
    pub containers: Vec<String>,
}

impl ECSTask {
    /// Creates an empty task record for the given task ARN.
    pub fn new(arn: impl Into<String>) -> Self {
        Self {
            id: EntityID::new(Kind::ECSTask, arn),
            meta: EntityMeta::default(),
            cluster_name: String::new(),
            family: String::new(),
            version: String::new(),
            launch_type: ECSLaunchType::default(),
            containers: Vec::default(),
        }
    }
}

/// The launch type of an ECS task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ECSLaunchType {
    #[default]
    EC2,
    Fargate,
}

/// Splits a runtime-prefixed entity name like `docker://abc123` into its
/// runtime and raw id parts.
///
/// Names without a `://` separator are returned unchanged with an
/// [`ContainerRuntime::Unknown`] runtime.
pub fn split_entity_name(name: &str) -> (ContainerRuntime, &str) {
    match name.split_once("://") {
        Some((prefix, id)) => {
            let runtime = prefix.parse().unwrap_or(ContainerRuntime::Unknown);
            (runtime, id)
        }
        None => (ContainerRuntime::Unknown, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_accessor() {
        let container = Entity::Container(Container::new("abc123"));
        assert_eq!(container.id(), &EntityID::new(Kind::Container, "abc123"));
        assert_eq!(container.kind(), Kind::Container);

        let pod = Entity::KubernetesPod(KubernetesPod::new("pod-uid"));
        assert_eq!(pod.id(), &EntityID::new(Kind::KubernetesPod, "pod-uid"));

        let task = Entity::ECSTask(ECSTask::new("task-arn"));
        assert_eq!(task.id(), &EntityID::new(Kind::ECSTask, "task-arn"));
    }

    #[test]
    fn test_entity_id_display() {
        let id = EntityID::new(Kind::KubernetesPod, "abc");
        assert_eq!(id.to_string(), "kubernetes_pod/abc");
    }

    #[test]
    fn test_split_entity_name() {
        let (runtime, id) = split_entity_name("docker://abc123");
        assert_eq!(runtime, ContainerRuntime::Docker);
        assert_eq!(id, "abc123");

        let (runtime, id) = split_entity_name("containerd://def456");
        assert_eq!(runtime, ContainerRuntime::Containerd);
        assert_eq!(id, "def456");

        let (runtime, id) = split_entity_name("bare-id");
        assert_eq!(runtime, ContainerRuntime::Unknown);
        assert_eq!(id, "bare-id");
    }
}
