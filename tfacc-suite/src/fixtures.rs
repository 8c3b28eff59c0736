//! Shared configuration fragments.
//!
//! Scenarios compose these with [`Document::compose`] instead of repeating
//! network and compute boilerplate.

use tfacc_hcl::{Block, Document, Expr, HclError};

pub const VPC: &str = "flexibleengine_vpc_v1.test";
pub const SUBNET: &str = "flexibleengine_vpc_subnet_v1.test";
pub const SECGROUP: &str = "flexibleengine_networking_secgroup_v2.test";
pub const AVAILABILITY_ZONES: &str = "data.flexibleengine_availability_zones.test";
pub const COMPUTE_FLAVORS: &str = "data.flexibleengine_compute_flavors_v2.test";
pub const IMAGE: &str = "data.flexibleengine_images_image.test";

/// First availability zone of the region.
pub fn first_zone() -> Expr {
    Expr::raw(format!("{AVAILABILITY_ZONES}.names[0]"))
}

/// VPC, subnet and security group, all named after `name`.
pub fn base_network(name: &str) -> Result<Document, HclError> {
    let mut doc = Document::new();
    doc.push(
        Block::resource("flexibleengine_vpc_v1", "test")
            .attr("name", name)
            .attr("cidr", "192.168.0.0/16"),
    )?
    .push(
        Block::resource("flexibleengine_vpc_subnet_v1", "test")
            .attr("name", name)
            .attr("cidr", "192.168.0.0/24")
            .attr("gateway_ip", "192.168.0.1")
            .attr("vpc_id", Expr::reference(VPC, "id")),
    )?
    .push(Block::resource("flexibleengine_networking_secgroup_v2", "test").attr("name", name))?;
    Ok(doc)
}

/// Availability zones data source.
pub fn availability_zones() -> Result<Document, HclError> {
    let mut doc = Document::new();
    doc.push(Block::data("flexibleengine_availability_zones", "test"))?;
    Ok(doc)
}

/// Zones, a small flavor, an Ubuntu image and the base network.
pub fn base_compute(name: &str) -> Result<Document, HclError> {
    let mut doc = availability_zones()?;
    doc.push(
        Block::data("flexibleengine_compute_flavors_v2", "test")
            .attr("availability_zone", first_zone())
            .attr("performance_type", "normal")
            .attr("cpu_core", Expr::Int(2))
            .attr("memory_size", Expr::Int(4)),
    )?
    .push(
        Block::data("flexibleengine_images_image", "test")
            .attr("name", "OBS Ubuntu 18.04")
            .attr("most_recent", true),
    )?;
    doc.merge(base_network(name)?)?;
    Ok(doc)
}
