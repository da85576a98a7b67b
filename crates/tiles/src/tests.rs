use super::*;

#[test]
fn clamp_render_cap_stays_within_display_for_any_request() {
    let displays = [
        Extent::new(1, 1),
        Extent::new(100, 100),
        Extent::new(1920, 1080),
        Extent::new(7, 4096),
    ];
    let requests = [
        (0, 0),
        (-5, -1),
        (i64::MIN, i64::MAX),
        (30, 30),
        (100, 100),
        (5000, 3),
        (1, 0),
    ];
    for display in displays {
        for (width, height) in requests {
            let cap = clamp_render_cap(display, width, height);
            assert!(
                (1..=display.width).contains(&cap.width),
                "width {} outside 1..={} for request {width}",
                cap.width,
                display.width
            );
            assert!(
                (1..=display.height).contains(&cap.height),
                "height {} outside 1..={} for request {height}",
                cap.height,
                display.height
            );
        }
    }
}

#[test]
fn clamp_render_cap_keeps_in_range_requests() {
    assert_eq!(
        clamp_render_cap(Extent::new(100, 100), 30, 45),
        Extent::new(30, 45)
    );
}

#[test]
fn cover_of_100_by_30_needs_sixteen_tiles() {
    let cover = TileCover::new(Extent::new(100, 100), Extent::new(30, 30));
    assert_eq!(cover.tiles_x(), 4);
    assert_eq!(cover.tiles_y(), 4);
    assert_eq!(cover.tiles_per_frame(), 16);
}

#[test]
fn regions_sweep_display_exactly_once() {
    let display = Extent::new(100, 70);
    let cover = TileCover::new(display, Extent::new(30, 30));
    let mut hits = vec![0u32; display.pixel_count() as usize];
    for region in cover.regions() {
        for y in region.origin_y..region.origin_y + region.height {
            for x in region.origin_x..region.origin_x + region.width {
                hits[(y * display.width + x) as usize] += 1;
            }
        }
    }
    assert!(hits.iter().all(|count| *count == 1));
}

#[test]
fn edge_tiles_are_clipped_and_indices_wrap() {
    let cover = TileCover::new(Extent::new(100, 100), Extent::new(30, 30));
    assert_eq!(
        cover.region(3),
        TileRegion {
            origin_x: 90,
            origin_y: 0,
            width: 10,
            height: 30,
        }
    );
    assert_eq!(cover.region(15).height, 10);
    assert_eq!(cover.region(16), cover.region(0));
}

#[test]
fn uncapped_cover_is_a_single_tile() {
    let display = Extent::new(640, 480);
    let cover = TileCover::uncapped(display);
    assert_eq!(cover.tiles_per_frame(), 1);
    assert_eq!(cover.region(0), TileRegion::full(display));
}

#[test]
fn zero_display_is_treated_as_one_pixel() {
    let cover = TileCover::new(Extent::new(0, 0), Extent::new(0, 0));
    assert_eq!(cover.display(), Extent::new(1, 1));
    assert_eq!(cover.tiles_per_frame(), 1);
}
