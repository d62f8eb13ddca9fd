use regresshion_check::ports::parse_ports_str;

#[test]
fn parse_single_and_ranges() {
    let ports = parse_ports_str("22,2222-2224, 2223 ,8022").expect("parse ok");
    // Dedup, preserve insertion order of first appearance in each range/item
    assert_eq!(ports, vec![22, 2222, 2223, 2224, 8022]);
}

#[test]
fn default_value_is_ssh() {
    assert_eq!(parse_ports_str("22").unwrap(), vec![22]);
}

#[test]
fn invalid_port_rejected() {
    assert!(parse_ports_str("0").is_err());
}
