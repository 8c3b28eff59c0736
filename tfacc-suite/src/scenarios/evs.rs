//! EVS volumes data source scenario.
//!
//! Four data volumes covering VBD/SCSI and shared/normal are created from a
//! `list(object)` variable with `count` and attached to one instance. The
//! instance's system disk is the fifth in-use volume, so querying by server
//! id and status `in-use` must return five volumes.

use tfacc_hcl::{Block, Document, Expr, HclError, TemplateParams, TemplateRegistry};
use tfacc_runner::{Isolation, StepCheck, TestCase};
use tfacc_verify::AttributeCheck;

use super::ScenarioContext;
use crate::fixtures::{self, COMPUTE_FLAVORS, IMAGE, SUBNET};
use crate::prechecks;

pub const VOLUMES_BASIC: &str = "evs_volumes_data_source_basic";

pub const INSTANCE: &str = "flexibleengine_compute_instance_v2.test";
pub const VOLUME: &str = "flexibleengine_evs_volume.test";
pub const ATTACHMENT: &str = "flexibleengine_compute_volume_attach_v2.test";
pub const VOLUMES_DATA: &str = "data.flexibleengine_evs_volumes.test";

/// (suffix, device type, multiattach)
const VOLUME_LAYOUT: [(&str, &str, bool); 4] = [
    ("vbd_normal_volume", "VBD", false),
    ("vbd_share_volume", "VBD", true),
    ("scsi_normal_volume", "SCSI", false),
    ("scsi_share_volume", "SCSI", true),
];

pub(super) fn register(registry: &mut TemplateRegistry) -> Result<(), HclError> {
    registry.register_fn(VOLUMES_BASIC, volumes_basic)
}

pub(super) fn cases(ctx: &ScenarioContext<'_>) -> Result<Vec<TestCase>, anyhow::Error> {
    let name = ctx.underscore_name();
    let case = TestCase::builder(VOLUMES_BASIC)
        .isolation(Isolation::Parallel)
        .precheck(prechecks::region(ctx.provider))
        .apply(
            VOLUMES_BASIC,
            TemplateParams::new().with("name", name),
            vec![
                AttributeCheck::set(VOLUMES_DATA, "id")?.into(),
                AttributeCheck::count(VOLUMES_DATA, "volumes", 5)?.into(),
                StepCheck::Exists(INSTANCE.parse()?),
            ],
        )
        .build()?;
    Ok(vec![case])
}

fn volume_configuration() -> Block {
    let default = VOLUME_LAYOUT
        .iter()
        .map(|(suffix, device_type, multiattach)| {
            Expr::Object(vec![
                ("suffix".to_owned(), Expr::str(*suffix)),
                ("size".to_owned(), Expr::Int(100)),
                ("device_type".to_owned(), Expr::str(*device_type)),
                ("multiattach".to_owned(), Expr::Bool(*multiattach)),
            ])
        })
        .collect();

    Block::variable("volume_configuration")
        .attr(
            "type",
            Expr::raw(
                "list(object({ suffix = string, size = number, device_type = string, multiattach = bool }))",
            ),
        )
        .attr("default", Expr::List(default))
}

fn volumes_base(name: &str) -> Result<Document, HclError> {
    let mut doc = Document::new();
    doc.push(volume_configuration())?;
    doc.merge(fixtures::base_compute(name)?)?;

    let config = |field: &str| Expr::raw(format!("var.volume_configuration[count.index].{field}"));
    doc.push(
        Block::resource("flexibleengine_compute_instance_v2", "test")
            .attr("availability_zone", fixtures::first_zone())
            .attr("name", name)
            .attr("image_id", Expr::reference(IMAGE, "id"))
            .attr("flavor_id", Expr::raw(format!("{COMPUTE_FLAVORS}.flavors[0]")))
            .nested(Block::new("network").attr("uuid", Expr::reference(SUBNET, "id"))),
    )?
    .push(
        Block::resource("flexibleengine_evs_volume", "test")
            .attr("count", Expr::raw("length(var.volume_configuration)"))
            .gap()
            .attr("availability_zone", fixtures::first_zone())
            .attr("volume_type", "SSD")
            .attr(
                "name",
                format!("{name}_${{var.volume_configuration[count.index].suffix}}"),
            )
            .attr("size", config("size"))
            .attr("device_type", config("device_type"))
            .attr("multiattach", config("multiattach"))
            .gap()
            .attr(
                "tags",
                Expr::Object(vec![("index".to_owned(), Expr::raw("tostring(count.index)"))]),
            ),
    )?
    .push(
        Block::resource("flexibleengine_compute_volume_attach_v2", "test")
            .attr("count", Expr::raw(format!("length({VOLUME})")))
            .gap()
            .attr("instance_id", Expr::reference(INSTANCE, "id"))
            .attr("volume_id", Expr::raw(format!("{VOLUME}[count.index].id"))),
    )?;
    Ok(doc)
}

fn volumes_basic(params: &TemplateParams) -> Result<Document, HclError> {
    let mut doc = volumes_base(params.str("name")?)?;
    doc.push(
        Block::data("flexibleengine_evs_volumes", "test")
            .attr("depends_on", Expr::List(vec![Expr::raw(ATTACHMENT)]))
            .gap()
            .attr("availability_zone", fixtures::first_zone())
            .attr("server_id", Expr::reference(INSTANCE, "id"))
            .attr("status", "in-use"),
    )?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_counted_volumes_from_variable() {
        let mut registry = TemplateRegistry::new();
        register(&mut registry).unwrap();
        let rendered = registry
            .render(VOLUMES_BASIC, &TemplateParams::new().with("name", "tf_test_abcde"))
            .unwrap();
        let text = rendered.text;
        assert!(text.contains("variable \"volume_configuration\" {"));
        assert!(text.contains("count = length(var.volume_configuration)"));
        assert!(text.contains(
            "name              = \"tf_test_abcde_${var.volume_configuration[count.index].suffix}\""
        ));
        assert!(text.contains("depends_on = [flexibleengine_compute_volume_attach_v2.test]"));
        assert!(text.contains("status            = \"in-use\""));
    }

    #[test]
    fn missing_name_is_a_render_error() {
        let mut registry = TemplateRegistry::new();
        register(&mut registry).unwrap();
        assert!(registry.render(VOLUMES_BASIC, &TemplateParams::new()).is_err());
    }
}
