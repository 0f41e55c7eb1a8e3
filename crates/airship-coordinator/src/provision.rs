//! Provisioner collaborator
//!
//! The provisioner is the coordinator's window onto infrastructure
//! inventory: which agent and coordinator instances exist, and how to
//! create or destroy them. Cloud provisioning lives outside this crate;
//! the static implementation serves fixed fleets and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use airship_core::AirshipResult;

/// One provisioned machine in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_id: String,
    pub instance_type: Option<String>,
    /// Hierarchical location, e.g. `/region/zone/instance/agent`
    pub location: Option<String>,
    pub internal_uri: Option<String>,
    pub external_uri: Option<String>,
}

impl Instance {
    pub fn new(
        instance_id: impl Into<String>,
        instance_type: Option<String>,
        location: Option<String>,
        internal_uri: Option<String>,
        external_uri: Option<String>,
    ) -> Instance {
        Instance {
            instance_id: instance_id.into(),
            instance_type,
            location,
            internal_uri,
            external_uri,
        }
    }
}

/// Parameters for provisioning new instances
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub agent_config: Option<String>,
    pub count: usize,
    pub instance_type: Option<String>,
    pub availability_zone: Option<String>,
    pub ami: Option<String>,
    pub key_pair: Option<String>,
    pub security_group: Option<String>,
}

/// Infrastructure inventory collaborator
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn list_agents(&self) -> AirshipResult<Vec<Instance>>;

    async fn list_coordinators(&self) -> AirshipResult<Vec<Instance>>;

    async fn provision_agents(&self, request: &ProvisioningRequest)
        -> AirshipResult<Vec<Instance>>;

    async fn provision_coordinators(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<Instance>>;

    async fn terminate_agents(&self, instance_ids: &[String]) -> AirshipResult<()>;
}

/// Provisioner over a fixed inventory
///
/// Provisioning appends synthetic instances; termination removes them.
/// Useful for static fleets and tests.
pub struct StaticProvisioner {
    agents: RwLock<Vec<Instance>>,
    coordinators: RwLock<Vec<Instance>>,
}

impl StaticProvisioner {
    pub fn new(agents: Vec<Instance>, coordinators: Vec<Instance>) -> StaticProvisioner {
        StaticProvisioner {
            agents: RwLock::new(agents),
            coordinators: RwLock::new(coordinators),
        }
    }
}

#[async_trait]
impl Provisioner for StaticProvisioner {
    async fn list_agents(&self) -> AirshipResult<Vec<Instance>> {
        Ok(self.agents.read().await.clone())
    }

    async fn list_coordinators(&self) -> AirshipResult<Vec<Instance>> {
        Ok(self.coordinators.read().await.clone())
    }

    async fn provision_agents(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<Instance>> {
        let mut agents = self.agents.write().await;
        let mut provisioned = Vec::with_capacity(request.count);
        for _ in 0..request.count {
            let instance_id = format!("i-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
            let instance = Instance::new(
                instance_id.clone(),
                request.instance_type.clone(),
                Some(format!("/static/{instance_id}/agent")),
                None,
                None,
            );
            info!("provisioned static agent instance {instance_id}");
            agents.push(instance.clone());
            provisioned.push(instance);
        }
        Ok(provisioned)
    }

    async fn provision_coordinators(
        &self,
        request: &ProvisioningRequest,
    ) -> AirshipResult<Vec<Instance>> {
        let mut coordinators = self.coordinators.write().await;
        let mut provisioned = Vec::with_capacity(request.count);
        for _ in 0..request.count {
            let instance_id = format!("i-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
            let instance = Instance::new(
                instance_id.clone(),
                request.instance_type.clone(),
                Some(format!("/static/{instance_id}/coordinator")),
                None,
                None,
            );
            info!("provisioned static coordinator instance {instance_id}");
            coordinators.push(instance.clone());
            provisioned.push(instance);
        }
        Ok(provisioned)
    }

    async fn terminate_agents(&self, instance_ids: &[String]) -> AirshipResult<()> {
        let mut agents = self.agents.write().await;
        agents.retain(|instance| !instance_ids.contains(&instance.instance_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provision_and_terminate() {
        let provisioner = StaticProvisioner::new(
            vec![Instance::new("i-seed", None, None, None, None)],
            vec![],
        );

        let provisioned = provisioner
            .provision_agents(&ProvisioningRequest {
                count: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(provisioned.len(), 2);
        assert_eq!(provisioner.list_agents().await.unwrap().len(), 3);

        provisioner
            .terminate_agents(&[provisioned[0].instance_id.clone()])
            .await
            .unwrap();
        assert_eq!(provisioner.list_agents().await.unwrap().len(), 2);
    }
}
