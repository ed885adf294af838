//! Buildah invocation: `bud` then `push` in one shell.
//!
//! The destination and context directory reach the script through the
//! environment, so the shell text never embeds caller-supplied values.

use super::{env_var, BuildTool, PublishContext};
use crate::bundle::DOCKERFILE;

const STORAGE_DRIVER: &str = "--storage-driver=vfs";
const CONTEXT_ENV: &str = "BUILD_CONTEXT";
const DESTINATION_ENV: &str = "DESTINATION";

pub(super) fn build_tool(ctx: &PublishContext<'_>) -> BuildTool {
    let tls = if ctx.registry().insecure {
        " --tls-verify=false"
    } else {
        ""
    };

    let script = format!(
        "buildah bud {STORAGE_DRIVER}{tls} -f \"${CONTEXT_ENV}/{DOCKERFILE}\" -t \"${DESTINATION_ENV}\" \"${CONTEXT_ENV}\" \
         && buildah push {STORAGE_DRIVER}{tls} \"${DESTINATION_ENV}\" \"docker://${DESTINATION_ENV}\""
    );

    let mut env = vec![
        env_var(CONTEXT_ENV, ctx.context_dir.clone()),
        env_var(DESTINATION_ENV, ctx.destination.clone()),
    ];
    env.extend(
        ctx.docker_config_dir
            .iter()
            .map(|dir| env_var("REGISTRY_AUTH_FILE", format!("{dir}/config.json"))),
    );

    BuildTool {
        image: ctx.build.spec.tool_image.clone(),
        command: vec!["/bin/sh".to_string(), "-c".to_string()],
        args: vec![script],
        env,
        privileged: true,
    }
}

#[cfg(test)]
mod tests {
    use container_builder_api::PublishStrategy;

    use crate::publish::{build_tool, BuildTool};
    use crate::test_support::test_build;

    fn env<'a>(tool: &'a BuildTool, name: &str) -> Option<&'a str> {
        tool.env
            .iter()
            .find(|var| var.name == name)
            .and_then(|var| var.value.as_deref())
    }

    #[test]
    fn buildah_builds_then_pushes() {
        let mut build = test_build();
        build.spec.publish_strategy = PublishStrategy::Buildah;

        let tool = build_tool(&build);

        assert_eq!(tool.command, vec!["/bin/sh", "-c"]);
        assert_eq!(tool.args.len(), 1);
        let script = &tool.args[0];
        assert!(script.starts_with(
            "buildah bud --storage-driver=vfs -f \"$BUILD_CONTEXT/Dockerfile\" \
             -t \"$DESTINATION\" \"$BUILD_CONTEXT\""
        ));
        assert!(script.ends_with(
            "&& buildah push --storage-driver=vfs \"$DESTINATION\" \"docker://$DESTINATION\""
        ));
        assert!(!script.contains("--tls-verify=false"));
        assert_eq!(env(&tool, "BUILD_CONTEXT"), Some("/workspace/context"));
        assert_eq!(
            env(&tool, "DESTINATION"),
            Some("quay.io/kiegroup/buildexample:latest")
        );
        assert!(tool.privileged);
    }

    #[test]
    fn buildah_script_never_embeds_the_image() {
        let mut build = test_build();
        build.spec.publish_strategy = PublishStrategy::Buildah;
        build.spec.image = "quay.io/x/build:latest; touch /pwned #".to_string();

        let tool = build_tool(&build);

        assert!(!tool.args[0].contains("quay.io"));
        assert!(!tool.args[0].contains("pwned"));
        assert_eq!(env(&tool, "DESTINATION"), Some(build.spec.image.as_str()));
    }

    #[test]
    fn buildah_insecure_registry_and_auth_file() {
        let mut build = test_build();
        build.spec.publish_strategy = PublishStrategy::Buildah;
        build.spec.platform.spec.registry.insecure = true;
        build.spec.platform.spec.registry.secret = Some("push-secret".to_string());

        let tool = build_tool(&build);

        assert_eq!(tool.args[0].matches("--tls-verify=false").count(), 2);
        assert_eq!(
            env(&tool, "REGISTRY_AUTH_FILE"),
            Some("/workspace/.docker/config.json")
        );
    }
}
