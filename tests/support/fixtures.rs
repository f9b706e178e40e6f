//! Fixture contexts.

use std::collections::BTreeMap;

use cloud_builder::core::cloud::{
    self, BackendConfig, CloudBackend, CloudProvider, Configurable, ProviderConfig, Recipe,
    RecipeConfig,
};
use cloud_builder::core::target::Output;
use cloud_builder::{Context, Cookbook, TargetFactory};

/// Build time of the fixture cookbook.
pub const TIMESTAMP: &str = "2024-03-01T12:00:00Z";

/// Recipes: `vpn` on aws (s3 backend) and google, `db` on aws.
pub fn cookbook() -> Cookbook {
    Cookbook::with_recipes(
        TIMESTAMP,
        [
            Box::new(
                RecipeConfig::new("vpn", "aws", &["region", "name", "instance_type"])
                    .with_key_fields(&["region", "name"])
                    .with_backend("s3"),
            ) as Box<dyn Recipe>,
            Box::new(
                RecipeConfig::new("vpn", "google", &["zone", "name"])
                    .with_key_fields(&["zone", "name"]),
            ),
            Box::new(
                RecipeConfig::new("db", "aws", &["group", "name", "size"])
                    .with_key_fields(&["group", "name"]),
            ),
        ],
    )
}

/// Context with aws/google providers and s3/gcs backends, nothing set.
pub fn context() -> Context {
    Context::new(
        cookbook(),
        cloud::providers([
            Box::new(ProviderConfig::new("aws", &["access_key", "secret_key", "region"]))
                as Box<dyn CloudProvider>,
            Box::new(ProviderConfig::new("google", &["project", "credentials"])),
        ]),
        cloud::backends([
            Box::new(BackendConfig::new("s3", &["bucket", "key"])) as Box<dyn CloudBackend>,
            Box::new(BackendConfig::new("gcs", &["bucket"])),
        ]),
    )
}

/// Create a target through the context factory and store it.
pub fn add_target(ctx: &mut Context, recipe: &str, iaas: &str, values: &[(&str, &str)]) -> String {
    let mut target = ctx.new_target(recipe, iaas).expect("fixture recipe missing");
    for (field, value) in values {
        target.recipe.set_value(field, value).expect("fixture field missing");
    }
    let key = target.key();
    ctx.save_target(&key, target);
    key
}

/// Context with provider credentials, a backend, recipe inputs and targets.
pub fn populated() -> Context {
    let mut ctx = context();

    let mut aws = ctx.get_cloud_provider("aws").unwrap();
    aws.set_value("access_key", "AKIAEXAMPLE").unwrap();
    aws.set_value("secret_key", "wJalrXUtnFEMI/K7MDENG").unwrap();
    ctx.save_cloud_provider(aws);

    let mut s3 = ctx.get_cloud_backend("s3").unwrap();
    s3.set_value("bucket", "cb-state").unwrap();
    ctx.save_cloud_backend(s3);

    let mut recipe = ctx.get_cookbook_recipe("vpn", "aws").unwrap();
    recipe.set_value("instance_type", "t3.micro").unwrap();
    ctx.save_cookbook_recipe(recipe);

    let key = add_target(
        &mut ctx,
        "vpn",
        "aws",
        &[("region", "us-east-1"), ("name", "office")],
    );
    let mut target = ctx.get_target(&key).unwrap();
    target
        .backend
        .as_mut()
        .unwrap()
        .set_value("key", "vpn/office.tfstate")
        .unwrap();
    target.output = Some(BTreeMap::from([
        ("public_ip".to_string(), Output::new("203.0.113.7")),
        (
            "admin_password".to_string(),
            Output {
                sensitive: true,
                ..Output::new("s3cr3t")
            },
        ),
    ]));
    ctx.save_target(&key, target);

    add_target(&mut ctx, "vpn", "google", &[("zone", "us-central1-a"), ("name", "home")]);
    add_target(&mut ctx, "db", "aws", &[("group", "prod"), ("name", "orders")]);

    ctx
}
