//! Environment source: `SHOTFORGE__SECTION__KEY=value`

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const ENV_PREFIX: &str = "SHOTFORGE";
pub const ENV_SEPARATOR: &str = "__";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    )
}
