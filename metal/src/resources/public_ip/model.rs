//! Mapping between `metal_public_ip` values and IP API messages

use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::ip::{AllocateIpRequest, Ip, IpType};
use crate::resources::format_timestamp;

/// Configurable part of a public IP
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicIpModel {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub project: Option<String>,
    pub ip_type: Option<String>,
    pub tags: Vec<String>,
}

impl PublicIpModel {
    pub fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let name = value
            .get_optional_string(&AttributePath::new("name"))
            .ok_or_else(|| {
                Diagnostic::error("Missing name", "The 'name' attribute is required")
                    .with_attribute(AttributePath::new("name"))
            })?;

        let tags = value
            .get(&AttributePath::new("tags"))
            .and_then(Dynamic::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Dynamic::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id: value.get_optional_string(&AttributePath::new("id")),
            name,
            description: value.get_optional_string(&AttributePath::new("description")),
            project: value.get_optional_string(&AttributePath::new("project")),
            ip_type: value.get_optional_string(&AttributePath::new("type")),
            tags,
        })
    }

    fn parsed_type(&self) -> Result<IpType, Diagnostic> {
        let name = self.ip_type.as_deref().unwrap_or_default();
        IpType::from_name(name).ok_or_else(|| {
            Diagnostic::error("Invalid ip type", format!("ip type {:?} is invalid", name))
                .with_attribute(AttributePath::new("type"))
        })
    }

    pub fn allocate_request(&self, default_project: &str) -> Result<AllocateIpRequest, Diagnostic> {
        let is_static = match self.parsed_type()? {
            IpType::Static => Some(true),
            IpType::Ephemeral => Some(false),
            IpType::Unspecified => None,
        };

        Ok(AllocateIpRequest {
            project: self
                .project
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| default_project.to_string()),
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            tags: self.tags.clone(),
            is_static,
        })
    }

    /// Planned changes laid over the stored address
    ///
    /// Static addresses never go back to ephemeral.
    pub fn apply_to(&self, mut ip: Ip) -> Result<Ip, Diagnostic> {
        ip.name = self.name.clone();
        if let Some(description) = &self.description {
            ip.description = description.clone();
        }
        if self.ip_type.is_some() {
            let planned = self.parsed_type()?;
            if ip.ip_type == IpType::Static && planned == IpType::Ephemeral {
                return Err(Diagnostic::error(
                    "Cannot update static IPs to ephemeral",
                    "Static IP addresses cannot be declared ephemeral.",
                )
                .with_attribute(AttributePath::new("type")));
            }
            if planned != IpType::Unspecified {
                ip.ip_type = planned;
            }
        }
        ip.tags = self.tags.clone();
        Ok(ip)
    }
}

/// The stored address as the API knows it
pub fn ip_from_state(state: &DynamicValue) -> Ip {
    let text = |name: &str| {
        state
            .get_optional_string(&AttributePath::new(name))
            .unwrap_or_default()
    };

    Ip {
        uuid: text("id"),
        ip: text("ip"),
        name: text("name"),
        description: text("description"),
        network: text("network"),
        project: text("project"),
        ip_type: IpType::from_name(&text("type")).unwrap_or_default(),
        tags: state
            .get(&AttributePath::new("tags"))
            .and_then(Dynamic::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Dynamic::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        created_at: None,
        updated_at: None,
    }
}

pub fn ip_to_dynamic(ip: &Ip) -> Dynamic {
    Dynamic::object([
        ("id", Dynamic::from(ip.uuid.as_str())),
        ("ip", Dynamic::from(ip.ip.as_str())),
        ("name", Dynamic::from(ip.name.as_str())),
        ("description", Dynamic::from(ip.description.as_str())),
        ("network", Dynamic::from(ip.network.as_str())),
        ("project", Dynamic::from(ip.project.as_str())),
        ("type", Dynamic::from(ip.ip_type.as_str())),
        ("tags", Dynamic::from(ip.tags.clone())),
        ("created_at", Dynamic::from(format_timestamp(ip.created_at))),
        ("updated_at", Dynamic::from(format_timestamp(ip.updated_at))),
    ])
}

pub fn ip_to_state(ip: &Ip) -> DynamicValue {
    DynamicValue::new(ip_to_dynamic(ip))
}
