//! PHP extension installer for official `php` Docker images.
//!
//! Each supported extension maps to a fixed recipe: optional apt packages,
//! an optional `docker-php-ext-configure` call, then `docker-php-ext-install`.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::shell::RunOptions;
use crate::utils::args::NameList;
use serde::Serialize;

/// How an extension is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtensionRecipe {
    /// Bundled with the image sources; nothing beyond the install step.
    NoExtra,
    /// Needs apt packages before building.
    DepsOnly { deps: &'static str },
    /// Needs apt packages and a configure step with extra flags.
    DepsAndConfigure {
        deps: &'static str,
        flags: &'static str,
    },
}

impl ExtensionRecipe {
    pub fn dependencies(&self) -> Option<&'static str> {
        match *self {
            ExtensionRecipe::NoExtra => None,
            ExtensionRecipe::DepsOnly { deps } | ExtensionRecipe::DepsAndConfigure { deps, .. } => {
                Some(deps).filter(|d| !d.trim().is_empty())
            }
        }
    }

    pub fn configure_flags(&self) -> Option<&'static str> {
        match *self {
            ExtensionRecipe::DepsAndConfigure { flags, .. } => Some(flags),
            _ => None,
        }
    }
}

const CATALOG: &[(&str, ExtensionRecipe)] = &[
    ("curl", ExtensionRecipe::DepsOnly { deps: "libcurl4-openssl-dev" }),
    // libfreetype6-dev and libjpeg62-turbo-dev are no longer required
    ("gd", ExtensionRecipe::DepsOnly { deps: "libpng12-dev" }),
    ("hash", ExtensionRecipe::NoExtra),
    (
        "imap",
        ExtensionRecipe::DepsAndConfigure {
            deps: "libc-client-dev libkrb5-dev",
            flags: "--with-kerberos --with-imap-ssl",
        },
    ),
    ("intl", ExtensionRecipe::DepsOnly { deps: "libicu-dev" }),
    ("mbstring", ExtensionRecipe::NoExtra),
    ("mcrypt", ExtensionRecipe::DepsOnly { deps: "libmcrypt-dev" }),
    ("pcntl", ExtensionRecipe::NoExtra),
    ("pdo_mysql", ExtensionRecipe::NoExtra),
    ("xsl", ExtensionRecipe::DepsOnly { deps: "libxslt-dev" }),
    ("zip", ExtensionRecipe::DepsOnly { deps: "zlib1g-dev" }),
];

/// Catalog entry as reported by `dockyard php-ext list`.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub recipe: ExtensionRecipe,
}

pub fn catalog() -> Vec<CatalogEntry> {
    CATALOG
        .iter()
        .map(|&(name, recipe)| CatalogEntry { name, recipe })
        .collect()
}

pub fn lookup(name: &str) -> Option<ExtensionRecipe> {
    CATALOG
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, recipe)| *recipe)
}

pub fn known_extensions() -> Vec<String> {
    CATALOG.iter().map(|(name, _)| name.to_string()).collect()
}

/// Shell steps that install `name`, in execution order.
pub fn install_steps(name: &str) -> Result<Vec<String>> {
    let recipe = lookup(name).ok_or_else(|| Error::extension_unknown(name, known_extensions()))?;

    let mut steps = Vec::new();
    if let Some(deps) = recipe.dependencies() {
        steps.push(format!("apt-get install -y {}", deps));
    }
    if let Some(flags) = recipe.configure_flags() {
        steps.push(format!("docker-php-ext-configure {} {}", name, flags));
    }
    steps.push(format!("docker-php-ext-install {}", name));

    Ok(steps)
}

#[derive(Debug, Clone, Serialize)]
pub struct InstalledExtension {
    pub name: String,
    pub command: String,
}

/// Install extensions one by one, in order.
///
/// An unknown name aborts the batch; extensions before it stay installed.
pub fn install_php_extensions(ctx: &Context, names: impl Into<NameList>) -> Result<Vec<InstalledExtension>> {
    let mut installed = Vec::new();

    for name in &names.into() {
        let command = install_steps(name)?.join(" && ");

        ctx.operation(format!("Installing PHP extension \"{}\"", name), |ctx| {
            ctx.run(&command, &RunOptions::default()).map(|_| ())
        })?;

        installed.push(InstalledExtension {
            name: name.clone(),
            command,
        });
    }

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::context;

    #[test]
    fn curl_installs_dependencies_then_extension() {
        assert_eq!(
            install_steps("curl").unwrap(),
            vec![
                "apt-get install -y libcurl4-openssl-dev".to_string(),
                "docker-php-ext-install curl".to_string(),
            ]
        );
    }

    #[test]
    fn hash_only_installs() {
        assert_eq!(
            install_steps("hash").unwrap(),
            vec!["docker-php-ext-install hash".to_string()]
        );
    }

    #[test]
    fn imap_configures_before_install() {
        assert_eq!(
            install_steps("imap").unwrap(),
            vec![
                "apt-get install -y libc-client-dev libkrb5-dev".to_string(),
                "docker-php-ext-configure imap --with-kerberos --with-imap-ssl".to_string(),
                "docker-php-ext-install imap".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = install_steps("nope").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ExtensionUnknown);
        assert_eq!(err.details["id"], "nope");
    }

    #[test]
    fn batch_runs_one_command_per_extension() {
        let (ctx, shell) = context();
        let installed = install_php_extensions(&ctx, vec!["curl", "hash"]).unwrap();

        assert_eq!(installed.len(), 2);
        assert_eq!(
            shell.lines(),
            vec![
                "apt-get install -y libcurl4-openssl-dev && docker-php-ext-install curl",
                "docker-php-ext-install hash",
            ]
        );
        let operations: Vec<Option<String>> = ctx.commands().into_iter().map(|c| c.operation).collect();
        assert_eq!(
            operations,
            vec![
                Some("Installing PHP extension \"curl\"".to_string()),
                Some("Installing PHP extension \"hash\"".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_name_aborts_remaining_batch() {
        let (ctx, shell) = context();
        let err = install_php_extensions(&ctx, vec!["zip", "nope", "intl"]).unwrap_err();

        assert_eq!(err.code, crate::ErrorCode::ExtensionUnknown);
        assert_eq!(
            shell.lines(),
            vec!["apt-get install -y zlib1g-dev && docker-php-ext-install zip"]
        );
    }

    #[test]
    fn single_name_is_accepted() {
        let (ctx, shell) = context();
        install_php_extensions(&ctx, "pcntl").unwrap();
        assert_eq!(shell.lines(), vec!["docker-php-ext-install pcntl"]);
    }

    #[test]
    fn recipe_reports_deps_and_flags() {
        let imap = lookup("imap").unwrap();
        assert_eq!(imap.dependencies(), Some("libc-client-dev libkrb5-dev"));
        assert_eq!(imap.configure_flags(), Some("--with-kerberos --with-imap-ssl"));

        let zip = lookup("zip").unwrap();
        assert_eq!(zip.dependencies(), Some("zlib1g-dev"));
        assert_eq!(zip.configure_flags(), None);

        let hash = lookup("hash").unwrap();
        assert_eq!(hash.dependencies(), None);
        assert_eq!(hash.configure_flags(), None);
    }

    #[test]
    fn blank_dependencies_are_skipped() {
        let recipe = ExtensionRecipe::DepsOnly { deps: "  " };
        assert_eq!(recipe.dependencies(), None);
    }

    #[test]
    fn catalog_lists_every_extension() {
        let names: Vec<&str> = catalog().iter().map(|e| e.name).collect();
        assert_eq!(names.len(), 11);
        assert!(names.contains(&"pdo_mysql"));
        assert_eq!(lookup("mbstring"), Some(ExtensionRecipe::NoExtra));
    }
}
