//! Mirror the invoking host user inside the image.
//!
//! Files written to mounted directories keep the host uid and gid, and the
//! container runs as that user with passwordless sudo.

use std::collections::BTreeSet;

use clap::{Arg, ArgAction};
use kitbash_common::error::Result;
use kitbash_common::types::Arguments;
use kitbash_template::{Substitutions, substitutions};

use crate::extension::{Extension, names, precondition_error, render_fragment};
use crate::host::{self, HostUser};

/// Argument renaming the user inside the container.
pub const OVERRIDE_NAME_ARG: &str = "user_override_name";

/// Argument keeping the home directory of a replaced account.
pub const PRESERVE_HOME_ARG: &str = "user_preserve_home";

const ACCOUNT_SNIPPET: &str = r#"# sudo grants the mapped user root access inside the container
RUN if ! command -v sudo >/dev/null; then \
      apt-get update \
      && apt-get install -y --no-install-recommends sudo \
      && apt-get clean \
      && rm -rf /var/lib/apt/lists/*; \
    fi

RUN existing_user_by_uid=`getent passwd "@(uid)" | cut -f1 -d: || true` && \
    if [ -n "${existing_user_by_uid}" ]; then userdel @(userdel_flags) "${existing_user_by_uid}"; fi && \
    existing_user_by_name=`getent passwd "@(name)" | cut -f1 -d: || true` && \
    if [ -n "${existing_user_by_name}" ]; then userdel @(userdel_flags) "${existing_user_by_name}"; fi && \
    existing_group_by_gid=`getent group "@(gid)" | cut -f1 -d: || true` && \
    if [ -z "${existing_group_by_gid}" ]; then groupadd -g "@(gid)" "@(name)"; fi && \
    useradd --no-log-init --no-create-home --uid "@(uid)" @(shell_option) -c "@(gecos)" -g "@(gid)" -d "@(dir)" "@(name)" && \
    echo "@(name) ALL=NOPASSWD: ALL" >> /etc/sudoers.d/kitbash
"#;

const HOME_SNIPPET: &str = r#"
RUN mkdir -p "$(dirname "@(dir)")" && mkhomedir_helper @(name)
"#;

const SWITCH_SNIPPET: &str = "
# Everything below runs as the mapped user
USER @(name)
WORKDIR @(dir)
";

/// Snippet template; the home directory is created in the image only when
/// the `home` extension does not mount it at run time.
fn template(home_mounted: bool) -> String {
    let mut template = ACCOUNT_SNIPPET.to_string();
    if !home_mounted {
        template.push_str(HOME_SNIPPET);
    }
    template.push_str(SWITCH_SNIPPET);
    template
}

/// Creates the host user in the image and switches to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct User;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(User)
}

impl User {
    /// Builds the placeholder table for `account`.
    #[must_use]
    pub fn table_for(account: &HostUser, args: &Arguments) -> Substitutions {
        let name = args.text(OVERRIDE_NAME_ARG).unwrap_or(&account.name);
        let dir = if args.contains(OVERRIDE_NAME_ARG) {
            format!("/home/{name}")
        } else {
            account.dir.display().to_string()
        };
        let shell_option = if account.shell.is_empty() {
            String::new()
        } else {
            format!("-s {}", account.shell)
        };
        let userdel_flags = if args.flag(PRESERVE_HOME_ARG) { "" } else { "-r" };
        // The GECOS field is embedded in a double-quoted shell word.
        let gecos: String = account
            .gecos
            .chars()
            .filter(|c| !matches!(c, '"' | '`' | '$' | '\\'))
            .collect();

        substitutions([
            ("name", name.to_string()),
            ("uid", account.uid.to_string()),
            ("gid", account.gid.to_string()),
            ("dir", dir),
            ("shell_option", shell_option),
            ("gecos", gecos),
            ("userdel_flags", userdel_flags.to_string()),
        ])
    }
}

impl Extension for User {
    fn name(&self) -> &'static str {
        "user"
    }

    fn description(&self) -> &'static str {
        "Mirror the host user and group ids inside the container"
    }

    fn arguments(&self) -> Vec<Arg> {
        vec![
            Arg::new(self.name())
                .long(self.name())
                .action(ArgAction::SetTrue)
                .help(self.description()),
            Arg::new(OVERRIDE_NAME_ARG)
                .long("user-override-name")
                .value_name("NAME")
                .help("Name of the user inside the container"),
            Arg::new(PRESERVE_HOME_ARG)
                .long("user-preserve-home")
                .action(ArgAction::SetTrue)
                .help("Keep home directories of accounts replaced by the mapped user"),
        ]
    }

    fn invoke_after(&self, _args: &Arguments) -> BTreeSet<String> {
        names(["cuda", "nvidia", "x11"])
    }

    fn environment_substitutions(&self, args: &Arguments) -> Result<Substitutions> {
        let account =
            host::current_user().map_err(|e| precondition_error(self.name(), e.to_string()))?;
        Ok(Self::table_for(&account, args))
    }

    fn snippet(&self, args: &Arguments) -> Result<String> {
        let table = self.environment_substitutions(args)?;
        render_fragment(self.name(), &template(args.is_requested("home")), &table)
    }
}
