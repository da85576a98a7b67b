#[test]
fn renderer_wgsl_sources_parse_successfully() {
    parse_wgsl("average.wgsl", include_str!("average.wgsl"));
    parse_wgsl("present.wgsl", include_str!("present.wgsl"));
}

#[test]
fn average_shader_declares_compute_entry_point() {
    let module = parse_wgsl("average.wgsl", include_str!("average.wgsl"));
    let entry = module
        .entry_points
        .iter()
        .find(|entry| entry.name == "main")
        .expect("average.wgsl must declare main");
    assert_eq!(entry.stage, naga::ShaderStage::Compute);
    assert_eq!(entry.workgroup_size, [8, 8, 1]);
}

#[test]
fn present_shader_declares_vertex_and_fragment_entry_points() {
    let module = parse_wgsl("present.wgsl", include_str!("present.wgsl"));
    let stages: Vec<_> = module
        .entry_points
        .iter()
        .map(|entry| (entry.name.as_str(), entry.stage))
        .collect();
    assert!(stages.contains(&("vs_main", naga::ShaderStage::Vertex)));
    assert!(stages.contains(&("fs_main", naga::ShaderStage::Fragment)));
}

fn parse_wgsl(label: &str, source: &str) -> naga::Module {
    naga::front::wgsl::parse_str(source).unwrap_or_else(|error| {
        panic!(
            "WGSL parse failed for {label}: {}",
            error.emit_to_string(source)
        )
    })
}
