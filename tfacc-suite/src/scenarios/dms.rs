//! DMS RabbitMQ instance scenarios.
//!
//! Every case here creates a `flexibleengine_dms_rabbitmq_instance`. DMS
//! instances share a tenant-wide lock, so the cases run in the `dms`
//! exclusive group and never overlap each other.

use tfacc_hcl::{Block, Document, Expr, HclError, TemplateParams, TemplateRegistry};
use tfacc_runner::{Isolation, StepCheck, TestCase, TestCaseBuilder};
use tfacc_verify::AttributeCheck;

use super::ScenarioContext;
use crate::fixtures::{self, SECGROUP, SUBNET, VPC};
use crate::prechecks;

pub const BASIC: &str = "dms_rabbitmq_basic";
pub const BASIC_UPDATE: &str = "dms_rabbitmq_basic_update";
pub const NEW_FORMAT_CLUSTER: &str = "dms_rabbitmq_new_format_cluster";
pub const NEW_FORMAT_CLUSTER_UPDATE: &str = "dms_rabbitmq_new_format_cluster_update";
pub const NEW_FORMAT_SINGLE: &str = "dms_rabbitmq_new_format_single";
pub const NEW_FORMAT_SINGLE_UPDATE: &str = "dms_rabbitmq_new_format_single_update";
pub const PRE_PAID: &str = "dms_rabbitmq_pre_paid";
pub const PRE_PAID_UPDATE: &str = "dms_rabbitmq_pre_paid_update";
pub const WITH_EPS_ID: &str = "dms_rabbitmq_with_eps_id";
pub const COMPATIBLE: &str = "dms_rabbitmq_compatible";
pub const SINGLE: &str = "dms_rabbitmq_single";

pub const INSTANCE: &str = "flexibleengine_dms_rabbitmq_instance.test";
pub const PRODUCT_1: &str = "data.flexibleengine_dms_product.test1";
pub const PRODUCT_2: &str = "data.flexibleengine_dms_product.test2";
pub const FLAVORS: &str = "data.flexibleengine_dms_rabbitmq_flavors.test";

/// Scheduler group shared by every DMS case.
pub const ISOLATION_GROUP: &str = "dms";

const PASSWORD: &str = "Rabbitmqtest@123";
const IMPORT_IGNORE: [&str; 2] = ["password", "used_storage_space"];
const PRE_PAID_IMPORT_IGNORE: [&str; 4] = ["password", "auto_renew", "period", "period_unit"];

// ─── Templates ───────────────────────────────────────────────────────

pub(super) fn register(registry: &mut TemplateRegistry) -> Result<(), HclError> {
    registry.register_fn(BASIC, |p| product_instance(p, ProductPlan::Basic))?;
    registry.register_fn(BASIC_UPDATE, |p| product_instance(p, ProductPlan::BasicUpdate))?;
    registry.register_fn(WITH_EPS_ID, |p| product_instance(p, ProductPlan::WithEpsId))?;
    registry.register_fn(COMPATIBLE, |p| product_instance(p, ProductPlan::Compatible))?;
    registry.register_fn(SINGLE, |p| product_instance(p, ProductPlan::Single))?;

    for (name, plan) in [
        (NEW_FORMAT_CLUSTER, FlavorPlan::CLUSTER),
        (NEW_FORMAT_CLUSTER_UPDATE, FlavorPlan::CLUSTER_UPDATE),
        (NEW_FORMAT_SINGLE, FlavorPlan::SINGLE),
        (NEW_FORMAT_SINGLE_UPDATE, FlavorPlan::SINGLE_UPDATE),
        (PRE_PAID, FlavorPlan::PRE_PAID),
        (PRE_PAID_UPDATE, FlavorPlan::PRE_PAID_UPDATE),
    ] {
        registry.register_fn(name, move |p| flavor_instance(p, &plan))?;
    }
    Ok(())
}

fn tags(updated: bool) -> Expr {
    if updated {
        Expr::str_map([("key1", "value"), ("owner", "terraform_update")])
    } else {
        Expr::str_map([("key", "value"), ("owner", "terraform")])
    }
}

fn description(updated: bool) -> &'static str {
    if updated {
        "rabbitmq test update"
    } else {
        "rabbitmq test"
    }
}

/// Name, description and network placement shared by every instance.
fn instance_head(name: &str, description: Option<&str>) -> Block {
    Block::resource("flexibleengine_dms_rabbitmq_instance", "test")
        .attr("name", name)
        .attr_opt("description", description)
        .gap()
        .attr("vpc_id", Expr::reference(VPC, "id"))
        .attr("network_id", Expr::reference(SUBNET, "id"))
        .attr("security_group_id", Expr::reference(SECGROUP, "id"))
}

fn zones(count: usize) -> Expr {
    Expr::List(
        (0..count)
            .map(|i| Expr::raw(format!("data.flexibleengine_availability_zones.test.names[{i}]")))
            .collect(),
    )
}

/// Network, zones and two product lookups.
fn product_base(name: &str) -> Result<Document, HclError> {
    let mut doc = fixtures::base_network(name)?;
    doc.merge(fixtures::availability_zones()?)?;
    for product in ["test1", "test2"] {
        doc.push(
            Block::data("flexibleengine_dms_product", product)
                .attr("engine", "kafka")
                .attr("bandwidth", "100MB"),
        )?;
    }
    Ok(doc)
}

// --- product based ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProductPlan {
    Basic,
    BasicUpdate,
    WithEpsId,
    Compatible,
    Single,
}

fn product_instance(params: &TemplateParams, plan: ProductPlan) -> Result<Document, HclError> {
    let name = params.str("name")?;
    let instance_name = params.opt_str("instance_name")?.unwrap_or(name);
    let mut doc = product_base(name)?;

    let block = match plan {
        ProductPlan::Basic => instance_head(instance_name, Some(description(false)))
            .attr("availability_zones", zones(1))
            .gap()
            .attr("product_id", Expr::reference(PRODUCT_1, "id"))
            .attr("storage_spec_code", "dms.physical.storage.high"),
        ProductPlan::BasicUpdate => instance_head(instance_name, Some(description(true)))
            .attr("availability_zones", zones(1))
            .gap()
            .attr("product_id", Expr::reference(PRODUCT_2, "id"))
            .attr("engine_version", Expr::reference(PRODUCT_2, "version")),
        ProductPlan::WithEpsId => Block::resource("flexibleengine_dms_rabbitmq_instance", "test")
            .attr("name", instance_name)
            .attr("description", description(false))
            .attr("enterprise_project_id", params.str("enterprise_project_id")?)
            .gap()
            .attr("vpc_id", Expr::reference(VPC, "id"))
            .attr("network_id", Expr::reference(SUBNET, "id"))
            .attr("security_group_id", Expr::reference(SECGROUP, "id"))
            .attr("availability_zones", zones(2))
            .gap()
            .attr("product_id", Expr::reference(PRODUCT_1, "id")),
        ProductPlan::Compatible => {
            // storage_space and available_zones are the deprecated spellings
            doc.push(Block::data("flexibleengine_dms_az", "test"))?;
            instance_head(instance_name, Some(description(false)))
                .attr(
                    "available_zones",
                    Expr::List(vec![Expr::raw("data.flexibleengine_dms_az.test.id")]),
                )
                .gap()
                .attr("product_id", Expr::reference(PRODUCT_1, "id"))
                .attr("storage_space", Expr::reference(PRODUCT_1, "storage"))
        }
        ProductPlan::Single => {
            doc.push(
                Block::data("flexibleengine_dms_product", "single")
                    .attr("engine", "rabbitmq")
                    .attr("instance_type", "single")
                    .attr("version", "3.8.35")
                    .attr("node_num", Expr::Int(1)),
            )?;
            let single = "data.flexibleengine_dms_product.single";
            Block::resource("flexibleengine_dms_rabbitmq_instance", "test")
                .attr("availability_zones", zones(1))
                .gap()
                .attr("name", instance_name)
                .attr("vpc_id", Expr::reference(VPC, "id"))
                .attr("network_id", Expr::reference(SUBNET, "id"))
                .attr("security_group_id", Expr::reference(SECGROUP, "id"))
                .gap()
                .attr("product_id", Expr::reference(single, "id"))
                .attr("engine_version", Expr::reference(single, "version"))
                .attr("storage_space", Expr::reference(single, "storage"))
                .gap()
                .attr("access_user", "root")
                .attr("password", params.str("password")?)
        }
    };

    let block = match plan {
        ProductPlan::Single => block,
        _ => block
            .gap()
            .attr("access_user", "user")
            .attr("password", PASSWORD)
            .gap()
            .attr("tags", tags(plan == ProductPlan::BasicUpdate)),
    };
    doc.push(block)?;
    Ok(doc)
}

// --- flavor based ---

#[derive(Debug, Clone, Copy)]
enum Storage {
    /// minimum brokers times minimum storage per node of the base flavor
    Minimum,
    Fixed(i64),
}

/// Flavor-based instance layout.
#[derive(Debug, Clone, Copy)]
struct FlavorPlan {
    flavor_type: &'static str,
    /// local holding the flavor used for `flavor_id`
    flavor: &'static str,
    storage: Storage,
    /// local whose first IO spec supplies `storage_spec_code`
    spec_code: Option<&'static str>,
    broker_num: Option<i64>,
    pre_paid: bool,
    updated: bool,
}

impl FlavorPlan {
    const CLUSTER: Self = Self {
        flavor_type: "cluster",
        flavor: "flavor",
        storage: Storage::Minimum,
        spec_code: None,
        broker_num: Some(3),
        pre_paid: false,
        updated: false,
    };
    const CLUSTER_UPDATE: Self = Self {
        flavor: "newFlavor",
        storage: Storage::Fixed(1000),
        spec_code: Some("flavor"),
        broker_num: Some(5),
        updated: true,
        ..Self::CLUSTER
    };
    const SINGLE: Self = Self {
        flavor_type: "single",
        flavor: "flavor",
        storage: Storage::Minimum,
        spec_code: Some("flavor"),
        broker_num: None,
        pre_paid: false,
        updated: false,
    };
    const SINGLE_UPDATE: Self = Self {
        flavor: "newFlavor",
        storage: Storage::Fixed(600),
        spec_code: Some("newFlavor"),
        updated: true,
        ..Self::SINGLE
    };
    const PRE_PAID: Self = Self {
        spec_code: Some("flavor"),
        pre_paid: true,
        ..Self::CLUSTER
    };
    const PRE_PAID_UPDATE: Self = Self {
        updated: true,
        ..Self::PRE_PAID
    };

    /// Locals the instance refers to, in declaration order.
    fn flavor_locals(&self) -> Vec<&'static str> {
        let uses = |local: &str| {
            self.flavor == local
                || self.spec_code == Some(local)
                || (local == "flavor" && matches!(self.storage, Storage::Minimum))
        };
        ["flavor", "newFlavor"].into_iter().filter(|l| uses(l)).collect()
    }
}

fn flavor_instance(params: &TemplateParams, plan: &FlavorPlan) -> Result<Document, HclError> {
    let name = params.str("name")?;
    let instance_name = params.opt_str("instance_name")?.unwrap_or(name);

    let mut doc = fixtures::base_network(name)?;
    doc.merge(fixtures::availability_zones()?)?;
    doc.push(Block::data("flexibleengine_dms_rabbitmq_flavors", "test").attr("type", plan.flavor_type))?;

    let mut locals = Block::locals().attr("query_results", Expr::raw(FLAVORS));
    for local in plan.flavor_locals() {
        let index = if local == "flavor" { 0 } else { 1 };
        locals = locals.attr(local, Expr::raw(format!("{FLAVORS}.flavors[{index}]")));
    }
    doc.push(locals)?;

    let storage = match plan.storage {
        Storage::Minimum => Expr::raw(
            "local.flavor.properties[0].min_broker * local.flavor.properties[0].min_storage_per_node",
        ),
        Storage::Fixed(gb) => Expr::Int(gb),
    };

    let mut block = instance_head(instance_name, Some(description(plan.updated)))
        .gap()
        .attr("availability_zones", zones(1))
        .gap()
        .attr("flavor_id", Expr::raw(format!("local.{}.id", plan.flavor)))
        .attr(
            "engine_version",
            Expr::raw(
                "element(local.query_results.versions, length(local.query_results.versions)-1)",
            ),
        )
        .attr("storage_space", storage)
        .attr_opt(
            "storage_spec_code",
            plan.spec_code
                .map(|local| Expr::raw(format!("local.{local}.ios[0].storage_spec_code"))),
        )
        .attr_opt("broker_num", plan.broker_num.map(Expr::Int))
        .gap()
        .attr("access_user", "user")
        .attr("password", PASSWORD);

    if plan.pre_paid {
        block = block
            .gap()
            .attr("charging_mode", "prePaid")
            .attr("period_unit", "month")
            .attr("period", Expr::Int(1))
            .attr("auto_renew", true);
    }
    doc.push(block.gap().attr("tags", tags(plan.updated)))?;
    Ok(doc)
}

// ─── Cases ───────────────────────────────────────────────────────────

fn dms_case(ctx: &ScenarioContext<'_>, name: &str) -> TestCaseBuilder {
    TestCase::builder(name)
        .isolation(Isolation::exclusive(ISOLATION_GROUP))
        .check_destroy(true)
        .precheck(prechecks::region(ctx.provider))
}

fn exists() -> Result<StepCheck, anyhow::Error> {
    Ok(StepCheck::Exists(INSTANCE.parse()?))
}

fn equals(path: &str, value: impl Into<String>) -> Result<StepCheck, anyhow::Error> {
    Ok(AttributeCheck::equals(INSTANCE, path, value)?.into())
}

/// Existence, name and tag checks common to create and update steps.
fn common_checks(name: &str, updated: bool) -> Result<Vec<StepCheck>, anyhow::Error> {
    let mut checks = vec![exists()?, equals("name", name)?];
    if updated {
        checks.push(equals("tags.key1", "value")?);
        checks.push(equals("tags.owner", "terraform_update")?);
        checks.push(AttributeCheck::not_set(INSTANCE, "tags.key")?.into());
    } else {
        checks.push(equals("tags.key", "value")?);
        checks.push(equals("tags.owner", "terraform")?);
    }
    Ok(checks)
}

fn params(name: &str, instance_name: &str) -> TemplateParams {
    TemplateParams::new()
        .with("name", name)
        .with("instance_name", instance_name)
}

pub(super) fn cases(ctx: &ScenarioContext<'_>) -> Result<Vec<TestCase>, anyhow::Error> {
    Ok(vec![
        basic(ctx)?,
        new_format(ctx, NEW_FORMAT_CLUSTER, NEW_FORMAT_CLUSTER_UPDATE)?,
        new_format(ctx, NEW_FORMAT_SINGLE, NEW_FORMAT_SINGLE_UPDATE)?,
        pre_paid(ctx)?,
        with_eps_id(ctx)?,
        compatible(ctx)?,
        single(ctx)?,
    ])
}

fn basic(ctx: &ScenarioContext<'_>) -> Result<TestCase, anyhow::Error> {
    let name = ctx.dash_name();
    let update_name = ctx.dash_name();

    let mut created = common_checks(&name, false)?;
    created.push(equals("engine", "rabbitmq")?);

    let mut updated = common_checks(&update_name, true)?;
    updated.push(
        AttributeCheck::equals_reference(INSTANCE, "product_id", &format!("${{{PRODUCT_2}.id}}"))?
            .into(),
    );
    updated.push(equals("description", description(true))?);

    Ok(dms_case(ctx, BASIC)
        .apply(BASIC, params(&name, &name), created)
        .apply(BASIC_UPDATE, params(&name, &update_name), updated)
        .import_verify(INSTANCE, IMPORT_IGNORE)
        .build()?)
}

fn new_format(
    ctx: &ScenarioContext<'_>,
    create: &str,
    update: &str,
) -> Result<TestCase, anyhow::Error> {
    let name = ctx.dash_name();
    let update_name = ctx.dash_name();

    let mut created = common_checks(&name, false)?;
    created.push(equals("description", description(false))?);
    let mut updated = common_checks(&update_name, true)?;
    updated.push(equals("description", description(true))?);

    Ok(dms_case(ctx, create)
        .apply(create, params(&name, &name), created)
        .apply(update, params(&name, &update_name), updated)
        .import_verify(INSTANCE, IMPORT_IGNORE)
        .build()?)
}

fn pre_paid(ctx: &ScenarioContext<'_>) -> Result<TestCase, anyhow::Error> {
    let name = ctx.dash_name();
    let update_name = format!("{name}update");

    let billing = || -> Result<Vec<StepCheck>, anyhow::Error> {
        Ok(vec![equals("charging_mode", "prePaid")?, equals("broker_num", "3")?])
    };
    let mut created = common_checks(&name, false)?;
    created.push(equals("description", description(false))?);
    created.extend(billing()?);
    let mut updated = common_checks(&update_name, true)?;
    updated.push(equals("description", description(true))?);
    updated.extend(billing()?);

    Ok(dms_case(ctx, PRE_PAID)
        .apply(PRE_PAID, params(&name, &name), created)
        .apply(PRE_PAID_UPDATE, params(&name, &update_name), updated)
        .import_verify(INSTANCE, PRE_PAID_IMPORT_IGNORE)
        .build()?)
}

fn with_eps_id(ctx: &ScenarioContext<'_>) -> Result<TestCase, anyhow::Error> {
    let name = ctx.dash_name();
    let eps_id = ctx.provider.enterprise_project_id.as_str();

    let mut checks = common_checks(&name, false)?;
    checks.push(equals("engine", "rabbitmq")?);
    checks.push(equals("enterprise_project_id", eps_id)?);

    Ok(dms_case(ctx, WITH_EPS_ID)
        .precheck(prechecks::enterprise_project(ctx.provider))
        .apply(
            WITH_EPS_ID,
            params(&name, &name).with("enterprise_project_id", eps_id),
            checks,
        )
        .build()?)
}

fn compatible(ctx: &ScenarioContext<'_>) -> Result<TestCase, anyhow::Error> {
    let name = ctx.dash_name();
    let mut checks = common_checks(&name, false)?;
    checks.push(equals("engine", "rabbitmq")?);

    Ok(dms_case(ctx, COMPATIBLE)
        .apply(COMPATIBLE, params(&name, &name), checks)
        .import_verify(INSTANCE, IMPORT_IGNORE)
        .build()?)
}

fn single(ctx: &ScenarioContext<'_>) -> Result<TestCase, anyhow::Error> {
    let name = ctx.dash_name();
    Ok(dms_case(ctx, SINGLE)
        .apply(
            SINGLE,
            params(&name, &name).with("password", ctx.names.password()),
            vec![exists()?],
        )
        .build()?)
}
