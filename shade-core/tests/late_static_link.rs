use shade_core::*;

// The global store is initialized here before any declaration is attempted.
#[test]
fn test_declaration_after_first_read_is_rejected() {
    let before = static_link_enabled();

    let err = declare_static_link(!before).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
    assert!(err.to_string().contains("after configuration was read"));

    assert_eq!(static_link_enabled(), before);
    assert_eq!(StaticLink::packaged(), StaticLink::from_build_env());
}
