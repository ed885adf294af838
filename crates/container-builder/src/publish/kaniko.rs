//! Kaniko executor invocation.

use super::{env_var, BuildTool, PublishContext};
use crate::bundle::DOCKERFILE;

pub(super) fn build_tool(ctx: &PublishContext<'_>) -> BuildTool {
    let mut args = vec![
        format!("--dockerfile={}/{DOCKERFILE}", ctx.context_dir),
        format!("--context=dir://{}", ctx.context_dir),
        format!("--destination={}", ctx.destination),
    ];

    if ctx.build.spec.platform.spec.kaniko.cache {
        args.push("--cache=true".to_string());
    }
    if ctx.registry().insecure {
        args.push("--insecure".to_string());
        args.push("--skip-tls-verify".to_string());
    }

    let env = ctx
        .docker_config_dir
        .iter()
        .map(|dir| env_var("DOCKER_CONFIG", dir.clone()))
        .collect();

    BuildTool {
        image: ctx.build.spec.tool_image.clone(),
        command: Vec::new(),
        args,
        env,
        privileged: false,
    }
}
