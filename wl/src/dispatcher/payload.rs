//! Delivery payload shared with the ingress listener

use nodestore::Node;
use serde::{Deserialize, Serialize};

/// Body POSTed to a node's endpoint on every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    /// Name of the reporting node
    pub node_name: String,
    /// Current consumption metric
    pub provision_rate: f64,
    /// User operating the node, if any
    #[serde(default)]
    pub username: Option<String>,
}

impl From<&Node> for DeliveryPayload {
    fn from(node: &Node) -> Self {
        Self {
            node_name: node.name.clone(),
            provision_rate: node.provision_rate,
            username: node.assigned_user.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodestore::{NodeStatus, NodeType};
    use serde_json::json;

    #[test]
    fn test_payload_from_node() {
        let node = Node {
            id: "kitchen-faucet".to_string(),
            name: "Kitchen Faucet".to_string(),
            node_type: NodeType::Water,
            status: NodeStatus::On,
            provision_rate: 1.5,
            endpoint_url: "http://127.0.0.1:8001/monitoring".to_string(),
            assigned_user: None,
        };

        let value = serde_json::to_value(DeliveryPayload::from(&node)).unwrap();
        assert_eq!(
            value,
            json!({"node_name": "Kitchen Faucet", "provision_rate": 1.5, "username": null})
        );
    }
}
