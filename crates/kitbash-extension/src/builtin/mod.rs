//! Extensions that ship with kitbash.
//!
//! Core capabilities classify the base image (`nvidia`, `cuda`) or
//! prepare the host (`x11`, `user`); the rest only translate arguments
//! into container launch flags.

pub mod cuda;
pub mod devices;
pub mod env;
pub mod home;
pub mod name;
pub mod network;
pub mod nvidia;
pub mod privileged;
pub mod user;
pub mod volume;
pub mod x11;

use crate::registry::ExtensionFactory;

/// Factories of every built-in extension.
pub const FACTORIES: &[ExtensionFactory] = &[
    cuda::factory,
    devices::factory,
    env::factory,
    home::factory,
    name::factory,
    network::factory,
    nvidia::factory,
    privileged::factory,
    user::factory,
    volume::factory,
    x11::factory,
];

/// Quotes `value` for the shell-split run argument string.
pub(crate) fn quote(value: &str) -> String {
    shell_words::quote(value).into_owned()
}
