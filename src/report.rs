use crate::tree::cursor::NodeEntry;

fn child(key: Option<i32>) -> String {
    key.map_or_else(|| "-".to_string(), |k| k.to_string())
}

/// One line of the `print` listing: address, key, unpadded strings, ints,
/// height and the keys of both children (`-` when absent).
pub fn format_entry(entry: &NodeEntry) -> String {
    let ints: Vec<String> = entry.record.ints.iter().map(|i| i.to_string()).collect();
    format!(
        "address:{} key:{}, strings:{}, ints:{}, height:{}, left:{}, right:{}",
        entry.address,
        entry.key,
        entry.record.strings.join(" "),
        ints.join(" "),
        entry.height,
        child(entry.left_key),
        child(entry.right_key)
    )
}

/// Free-list addresses as a comma delimited line.
pub fn format_free_list(addresses: &[u64]) -> String {
    addresses.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
}
