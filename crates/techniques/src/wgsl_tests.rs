const KERNELS: [(&str, &str); 6] = [
    ("gradient.wgsl", include_str!("gradient.wgsl")),
    ("complex.wgsl", include_str!("complex.wgsl")),
    ("conway_step.wgsl", include_str!("conway_step.wgsl")),
    ("conway_draw.wgsl", include_str!("conway_draw.wgsl")),
    ("path_trace.wgsl", include_str!("path_trace.wgsl")),
    ("path_shade.wgsl", include_str!("path_shade.wgsl")),
];

#[test]
fn technique_kernels_declare_an_8x8_compute_main() {
    for (label, source) in KERNELS {
        let module = parse_wgsl(label, source);
        let entry = module
            .entry_points
            .iter()
            .find(|entry| entry.name == "main")
            .unwrap_or_else(|| panic!("{label} must declare main"));
        assert_eq!(entry.stage, naga::ShaderStage::Compute, "{label}");
        assert_eq!(
            entry.workgroup_size,
            [renderer::COMPUTE_WORKGROUP_SIZE, renderer::COMPUTE_WORKGROUP_SIZE, 1],
            "{label}"
        );
    }
}

#[test]
fn tile_kernels_bind_region_then_params_then_output() {
    for (label, source) in KERNELS {
        if label == "conway_step.wgsl" {
            continue;
        }
        let module = parse_wgsl(label, source);
        let bindings: Vec<_> = module
            .global_variables
            .iter()
            .filter_map(|(_, global)| global.binding.as_ref().map(|binding| binding.binding))
            .collect();
        for binding in 0..3 {
            assert!(bindings.contains(&binding), "{label} lacks binding {binding}");
        }
    }
}

fn parse_wgsl(label: &str, source: &str) -> naga::Module {
    naga::front::wgsl::parse_str(source).unwrap_or_else(|error| {
        panic!(
            "WGSL parse failed for {label}: {}",
            error.emit_to_string(source)
        )
    })
}
