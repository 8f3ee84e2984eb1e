// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use sasl_broker_rs::{
    cfg::{cli::resolve_config_path, config::Config},
    directory::{Directory as _, memory::MemoryDirectory},
};

#[test]
fn shipped_config_loads_and_seeds_a_directory() {
    let cfg = resolve_config_path(Some("config.yaml"))
        .and_then(Config::load_from_file)
        .expect("failed to resolve or load config");

    assert_eq!(cfg.service.nick, "SaslServ");
    assert_eq!(cfg.mechanisms.enabled, ["PLAIN", "EXTERNAL"]);
    assert_eq!(cfg.accounts.len(), 3);

    let dir = MemoryDirectory::from_config(&cfg).expect("failed to seed directory");

    let alice = dir.find_by_nick("alice").expect("alice must exist");
    assert!(dir.verify_password(&alice, b"hunter2"));
    assert_eq!(
        dir.metadata(&alice.eid, "private:usercloak").as_deref(),
        Some("alice.users.example.net")
    );

    assert!(
        dir.find_by_certfp("a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4")
            .is_some()
    );
}

#[test]
fn missing_config_path_is_an_error() {
    assert!(resolve_config_path(Some("does/not/exist.yaml")).is_err());
}
