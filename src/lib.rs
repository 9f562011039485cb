//! JSONPath for Liquid-style templates.
//!
//! Two plugins for the [`template`] engine, both driven by the same query
//! primitive in [`apply`]:
//!
//! * the `find` filter, `{{ data | find: '$.users.*.name' }}`
//! * a `for` tag that loops over matches,
//!   `{% for name in data | '$.users.*.name' %}...{% endfor %}`
//!
//! Template globals are visible to queries under the `_` namespace, and a
//! [`DefaultPolicy`] decides what a failed query produces.
//!
//! ```
//! use liquid_jsonpath::{environment_builder, ApplyConfig};
//! use serde_json::json;
//!
//! let env = environment_builder(ApplyConfig::default()).build();
//! let template = env
//!     .parse("{% for name in data | '$.users.*.name' %}{{ name }}, {% endfor %}")
//!     .unwrap();
//! let data = json!({"data": {"users": [{"name": "Sue"}, {"name": "John"}]}});
//! assert_eq!(template.render(&data).unwrap(), "Sue, John, ");
//! ```

pub mod apply;
pub mod config;
pub mod filter;
pub mod jsonpath;
pub mod policy;
pub mod tag;
pub mod template;

pub use apply::{apply, apply_compiled, Applied, ApplyConfig, ApplyError, FailureKind};
pub use filter::Find;
pub use policy::DefaultPolicy;
pub use tag::JsonPathForTag;

use template::EnvironmentBuilder;

/// A template environment builder with `find` and the JSONPath `for` tag
/// registered, both sharing `config`.
pub fn environment_builder(config: ApplyConfig) -> EnvironmentBuilder {
    EnvironmentBuilder::new()
        .filter("find", Find::with_config(config.clone()))
        .tag("for", JsonPathForTag::with_config(config))
}
