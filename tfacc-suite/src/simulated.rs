//! Simulated FlexibleEngine tenant.
//!
//! Registers the resource and data source behaviors the catalogue needs so
//! the whole suite can run against a [`MemoryCloud`] without credentials.
//! The behaviors only model what the checks observe: computed attributes,
//! attachment state, replacement triggers and write-only arguments.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tfacc_core::error::DriverError;
use tfacc_runner::{
    DataSourceBehavior, MemoryCloud, PlainResource, RemoteContext, RemoteObject, ResourceBehavior,
    RunnerError, StaticDataSource,
};

pub const DEFAULT_REGION: &str = "eu-west-0";

pub const VPC_TYPE: &str = "flexibleengine_vpc_v1";
pub const SUBNET_TYPE: &str = "flexibleengine_vpc_subnet_v1";
pub const SECGROUP_TYPE: &str = "flexibleengine_networking_secgroup_v2";
pub const INSTANCE_TYPE: &str = "flexibleengine_compute_instance_v2";
pub const VOLUME_TYPE: &str = "flexibleengine_evs_volume";
pub const ATTACH_TYPE: &str = "flexibleengine_compute_volume_attach_v2";
pub const RABBITMQ_TYPE: &str = "flexibleengine_dms_rabbitmq_instance";

const RABBITMQ_DEFAULT_VERSION: &str = "3.7.17";
const RABBITMQ_FLAVOR_VERSION: &str = "3.8.35";
const STORAGE_SPEC_CODE: &str = "dms.physical.storage.high.v2";

/// Builds a tenant for `region`. An empty region falls back to
/// [`DEFAULT_REGION`].
pub fn flexibleengine_cloud(region: &str) -> Result<MemoryCloud, RunnerError> {
    let region = if region.is_empty() { DEFAULT_REGION } else { region };
    let zones: Vec<String> = ["a", "b", "c"].iter().map(|s| format!("{region}{s}")).collect();

    let mut cloud = MemoryCloud::new();

    // ─── Network ─────────────────────────────────────────────────────
    cloud.register_resource(
        VPC_TYPE,
        Arc::new(Computed {
            defaults: &[("status", "OK")],
            force_new: &["cidr"],
        }),
    )?;
    cloud.register_resource(
        SUBNET_TYPE,
        Arc::new(Computed {
            defaults: &[("status", "ACTIVE"), ("dhcp_enable", "true")],
            force_new: &["cidr", "vpc_id", "gateway_ip"],
        }),
    )?;
    cloud.register_resource(SECGROUP_TYPE, Arc::new(PlainResource))?;

    // ─── Compute and EVS ─────────────────────────────────────────────
    cloud.register_resource(INSTANCE_TYPE, Arc::new(ComputeInstance))?;
    cloud.register_resource(VOLUME_TYPE, Arc::new(Volume))?;
    cloud.register_resource(ATTACH_TYPE, Arc::new(VolumeAttach))?;

    cloud.register_data_source(
        "flexibleengine_availability_zones",
        Arc::new(StaticDataSource::new(json!({
            "id": region,
            "state": "available",
            "names": zones,
        }))),
    )?;
    cloud.register_data_source(
        "flexibleengine_compute_flavors_v2",
        Arc::new(StaticDataSource::new(json!({
            "flavors": ["s3.large.2", "s3.xlarge.2"],
        }))),
    )?;
    cloud.register_data_source("flexibleengine_images_image", Arc::new(Image))?;
    cloud.register_data_source("flexibleengine_evs_volumes", Arc::new(VolumesQuery))?;

    // ─── DMS ─────────────────────────────────────────────────────────
    cloud.register_resource(RABBITMQ_TYPE, Arc::new(RabbitMqInstance))?;
    cloud.lock_type(RABBITMQ_TYPE);
    cloud.register_data_source("flexibleengine_dms_product", Arc::new(DmsProduct))?;
    cloud.register_data_source(
        "flexibleengine_dms_az",
        Arc::new(StaticDataSource::new(json!({
            "id": format!("{region}a"),
            "code": format!("{region}a"),
            "port": "8002",
        }))),
    )?;
    cloud.register_data_source(
        "flexibleengine_dms_rabbitmq_flavors",
        Arc::new(RabbitMqFlavors { zones }),
    )?;

    Ok(cloud)
}

fn str_arg<'a>(attributes: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    attributes.get(key).and_then(Value::as_str)
}

fn apply_error(message: impl Into<String>) -> DriverError {
    DriverError::Apply(message.into())
}

/// Resource that fills fixed computed attributes on create.
struct Computed {
    defaults: &'static [(&'static str, &'static str)],
    force_new: &'static [&'static str],
}

impl ResourceBehavior for Computed {
    fn on_create(
        &self,
        _ctx: &mut RemoteContext<'_>,
        attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        for (key, value) in self.defaults {
            attributes
                .entry((*key).to_owned())
                .or_insert_with(|| Value::String((*value).to_owned()));
        }
        Ok(())
    }

    fn force_new(&self) -> &[&str] {
        self.force_new
    }
}

// ─── Compute and EVS ─────────────────────────────────────────────────

/// Instance with a system disk that lives and dies with it.
struct ComputeInstance;

impl ResourceBehavior for ComputeInstance {
    fn on_create(
        &self,
        ctx: &mut RemoteContext<'_>,
        attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        let id = str_arg(attributes, "id").unwrap_or_default().to_owned();
        let name = str_arg(attributes, "name").unwrap_or("instance").to_owned();
        let zone = attributes.get("availability_zone").cloned().unwrap_or(Value::Null);

        let disk = json!({
            "name": format!("{name}-system"),
            "size": 40,
            "volume_type": "SSD",
            "device_type": "VBD",
            "multiattach": false,
            "bootable": true,
            "availability_zone": zone,
            "status": "in-use",
            "server_id": id,
        });
        let disk_id = ctx.create(VOLUME_TYPE, disk.as_object().cloned().unwrap_or_default());

        attributes.insert("status".to_owned(), json!("ACTIVE"));
        attributes.insert("access_ip_v4".to_owned(), json!("192.168.0.10"));
        attributes.insert("system_disk_id".to_owned(), json!(disk_id));
        Ok(())
    }

    fn on_delete(&self, ctx: &mut RemoteContext<'_>, object: &RemoteObject) {
        if let Some(disk_id) = str_arg(&object.attributes, "system_disk_id") {
            ctx.delete(disk_id);
        }
    }

    fn force_new(&self) -> &[&str] {
        &["image_id", "availability_zone", "network"]
    }
}

struct Volume;

impl ResourceBehavior for Volume {
    fn on_create(
        &self,
        _ctx: &mut RemoteContext<'_>,
        attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        attributes.insert("status".to_owned(), json!("available"));
        attributes.entry("multiattach".to_owned()).or_insert(json!(false));
        attributes.entry("device_type".to_owned()).or_insert(json!("VBD"));
        Ok(())
    }

    fn on_update(
        &self,
        _ctx: &mut RemoteContext<'_>,
        previous: &Map<String, Value>,
        attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        let size = |m: &Map<String, Value>| m.get("size").and_then(Value::as_i64);
        if let (Some(old), Some(new)) = (size(previous), size(attributes))
            && new < old
        {
            return Err(apply_error(format!("volume size cannot shrink from {old} to {new}")));
        }
        Ok(())
    }

    fn force_new(&self) -> &[&str] {
        &["availability_zone", "volume_type", "device_type", "multiattach"]
    }
}

/// Attachment that flips the target volume to `in-use`.
struct VolumeAttach;

impl ResourceBehavior for VolumeAttach {
    fn on_create(
        &self,
        ctx: &mut RemoteContext<'_>,
        attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        let instance_id = str_arg(attributes, "instance_id")
            .ok_or_else(|| apply_error("instance_id is required"))?
            .to_owned();
        let volume_id = str_arg(attributes, "volume_id")
            .ok_or_else(|| apply_error("volume_id is required"))?
            .to_owned();

        if !ctx
            .get(&instance_id)
            .is_some_and(|o| o.resource_type == INSTANCE_TYPE)
        {
            return Err(apply_error(format!("instance {instance_id} not found")));
        }
        let attached = ctx
            .objects_of(ATTACH_TYPE)
            .filter(|o| str_arg(&o.attributes, "volume_id") == Some(volume_id.as_str()))
            .count();

        let volume = ctx
            .get_mut(&volume_id)
            .filter(|o| o.resource_type == VOLUME_TYPE)
            .ok_or_else(|| apply_error(format!("volume {volume_id} not found")))?;
        let shared = volume
            .attributes
            .get("multiattach")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if attached > 0 && !shared {
            return Err(apply_error(format!(
                "volume {volume_id} is already attached and does not allow multiattach"
            )));
        }
        volume.attributes.insert("status".to_owned(), json!("in-use"));
        volume
            .attributes
            .insert("server_id".to_owned(), json!(instance_id));

        attributes.insert("device".to_owned(), json!("/dev/vdb"));
        Ok(())
    }

    fn on_delete(&self, ctx: &mut RemoteContext<'_>, object: &RemoteObject) {
        let Some(volume_id) = str_arg(&object.attributes, "volume_id") else {
            return;
        };
        let still_attached = ctx
            .objects_of(ATTACH_TYPE)
            .any(|o| str_arg(&o.attributes, "volume_id") == Some(volume_id));
        if still_attached {
            return;
        }
        if let Some(volume) = ctx.get_mut(volume_id) {
            volume.attributes.insert("status".to_owned(), json!("available"));
            volume.attributes.remove("server_id");
        }
    }

    fn force_new(&self) -> &[&str] {
        &["instance_id", "volume_id"]
    }
}

struct Image;

impl DataSourceBehavior for Image {
    fn read(
        &self,
        _ctx: &RemoteContext<'_>,
        args: &Map<String, Value>,
    ) -> Result<Map<String, Value>, DriverError> {
        let name = str_arg(args, "name").unwrap_or("OBS Ubuntu 18.04");
        let mut attributes = Map::new();
        attributes.insert("id".to_owned(), json!(format!("img-{}", name.to_lowercase().replace(' ', "-"))));
        attributes.insert("status".to_owned(), json!("active"));
        Ok(attributes)
    }
}

/// Volumes filtered by server, status and zone.
struct VolumesQuery;

impl DataSourceBehavior for VolumesQuery {
    fn read(
        &self,
        ctx: &RemoteContext<'_>,
        args: &Map<String, Value>,
    ) -> Result<Map<String, Value>, DriverError> {
        let filters: Vec<(&str, &str)> = ["server_id", "status", "availability_zone"]
            .into_iter()
            .filter_map(|key| str_arg(args, key).map(|value| (key, value)))
            .collect();

        let volumes: Vec<Value> = ctx
            .objects_of(VOLUME_TYPE)
            .filter(|volume| {
                filters
                    .iter()
                    .all(|(key, value)| str_arg(&volume.attributes, key) == Some(*value))
            })
            .map(|volume| {
                let mut entry = Map::new();
                for key in [
                    "id",
                    "name",
                    "size",
                    "volume_type",
                    "device_type",
                    "multiattach",
                    "availability_zone",
                    "status",
                    "server_id",
                ] {
                    if let Some(value) = volume.attributes.get(key) {
                        entry.insert(key.to_owned(), value.clone());
                    }
                }
                Value::Object(entry)
            })
            .collect();

        let mut attributes = Map::new();
        attributes.insert("volumes".to_owned(), Value::Array(volumes));
        Ok(attributes)
    }
}

// ─── DMS ─────────────────────────────────────────────────────────────

/// Product lookup keyed by engine and instance type or bandwidth.
struct DmsProduct;

impl DataSourceBehavior for DmsProduct {
    fn read(
        &self,
        _ctx: &RemoteContext<'_>,
        args: &Map<String, Value>,
    ) -> Result<Map<String, Value>, DriverError> {
        let engine = str_arg(args, "engine").ok_or_else(|| apply_error("engine is required"))?;
        let spec = str_arg(args, "instance_type")
            .or_else(|| str_arg(args, "bandwidth"))
            .unwrap_or("cluster");
        let version = str_arg(args, "version").unwrap_or(RABBITMQ_DEFAULT_VERSION);
        let storage = if spec == "single" { "100" } else { "600" };

        let mut attributes = Map::new();
        attributes.insert(
            "id".to_owned(),
            json!(format!("{engine}-{}-{version}", spec.to_lowercase())),
        );
        attributes.insert("version".to_owned(), json!(version));
        attributes.insert("storage".to_owned(), json!(storage));
        attributes.insert("storage_spec_code".to_owned(), json!(STORAGE_SPEC_CODE));
        Ok(attributes)
    }
}

/// Two flavors per instance type, smallest first.
struct RabbitMqFlavors {
    zones: Vec<String>,
}

impl DataSourceBehavior for RabbitMqFlavors {
    fn read(
        &self,
        _ctx: &RemoteContext<'_>,
        args: &Map<String, Value>,
    ) -> Result<Map<String, Value>, DriverError> {
        let flavor_type = str_arg(args, "type").unwrap_or("cluster");
        let (min_broker, max_broker) = match flavor_type {
            "single" => (1, 1),
            "cluster" => (3, 7),
            other => return Err(apply_error(format!("unknown rabbitmq flavor type {other}"))),
        };

        let flavors: Vec<Value> = ["c6.2u4g", "c6.4u8g"]
            .iter()
            .map(|size| {
                json!({
                    "id": format!("{size}.{flavor_type}"),
                    "type": flavor_type,
                    "arch_types": ["X86"],
                    "charging_modes": ["monthly", "hourly"],
                    "properties": [{
                        "min_broker": min_broker,
                        "max_broker": max_broker,
                        "min_storage_per_node": 100,
                        "max_storage_per_node": 30000,
                    }],
                    "ios": [{
                        "storage_spec_code": STORAGE_SPEC_CODE,
                        "type": "evs",
                        "availability_zones": self.zones,
                    }],
                })
            })
            .collect();

        let mut attributes = Map::new();
        attributes.insert("id".to_owned(), json!(format!("rabbitmq-{flavor_type}")));
        attributes.insert("flavors".to_owned(), Value::Array(flavors));
        attributes.insert("versions".to_owned(), json!([RABBITMQ_FLAVOR_VERSION]));
        Ok(attributes)
    }
}

/// RabbitMQ instance.
///
/// Accepts both the product-based and the flavor-based layouts as well as
/// the deprecated `available_zones` spelling.
struct RabbitMqInstance;

impl ResourceBehavior for RabbitMqInstance {
    fn on_create(
        &self,
        _ctx: &mut RemoteContext<'_>,
        attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        if !attributes.contains_key("product_id") && !attributes.contains_key("flavor_id") {
            return Err(apply_error("one of product_id or flavor_id must be specified"));
        }
        if !attributes.contains_key("availability_zones") && !attributes.contains_key("available_zones") {
            return Err(apply_error(
                "one of availability_zones or available_zones must be specified",
            ));
        }
        let name_len = str_arg(attributes, "name").map_or(0, str::len);
        if !(4..=64).contains(&name_len) {
            return Err(apply_error(format!(
                "instance name must be 4 to 64 characters, got {name_len}"
            )));
        }

        let defaults = [
            ("engine", json!("rabbitmq")),
            ("engine_version", json!(RABBITMQ_DEFAULT_VERSION)),
            ("status", json!("RUNNING")),
            ("used_storage_space", json!(0)),
            ("enterprise_project_id", json!("0")),
            ("charging_mode", json!("postPaid")),
            ("port", json!(5672)),
            ("connect_address", json!("192.168.0.100")),
            ("management_address", json!("http://192.168.0.100:15672")),
        ];
        for (key, value) in defaults {
            attributes.entry(key.to_owned()).or_insert(value);
        }
        Ok(())
    }

    fn on_update(
        &self,
        _ctx: &mut RemoteContext<'_>,
        previous: &Map<String, Value>,
        attributes: &mut Map<String, Value>,
    ) -> Result<(), DriverError> {
        let storage = |m: &Map<String, Value>| m.get("storage_space").and_then(Value::as_i64);
        if let (Some(old), Some(new)) = (storage(previous), storage(attributes))
            && new < old
        {
            return Err(apply_error(format!(
                "storage_space cannot shrink from {old} to {new}"
            )));
        }
        let brokers = |m: &Map<String, Value>| m.get("broker_num").and_then(Value::as_i64);
        if let (Some(old), Some(new)) = (brokers(previous), brokers(attributes))
            && new < old
        {
            return Err(apply_error(format!("broker_num cannot shrink from {old} to {new}")));
        }
        Ok(())
    }

    fn force_new(&self) -> &[&str] {
        &[
            "vpc_id",
            "network_id",
            "security_group_id",
            "availability_zones",
            "available_zones",
            "access_user",
            "charging_mode",
        ]
    }

    fn write_only(&self) -> &[&str] {
        &["password", "auto_renew", "period", "period_unit"]
    }
}
