use kernel_memory_addresses::{PAGE_SIZE, PageOffset, PhysicalFrameNumber, VirtualAddress, VirtualPageNumber};
use kernel_vm::{
    AccessKind, ExecutableImage, LoadError, MemoryImage, MemorySwap, PagingMode, ProcessId, Section,
    SwapError, SwapStore, VmConfig, VmError, VmKernel,
};
use std::sync::Arc;

fn vpn(v: u32) -> VirtualPageNumber {
    VirtualPageNumber::new(v)
}

fn kernel(frames: usize) -> VmKernel {
    VmKernel::new(
        VmConfig::default().with_frame_count(frames).with_stack_pages(2),
        Arc::new(MemorySwap::new()),
    )
}

/// Read-only text page filled with 0xC0, then a writable data page with `b"data"`.
fn program() -> Arc<dyn ExecutableImage> {
    Arc::new(
        MemoryImage::new()
            .with_entry_point(VirtualAddress::new(0x20))
            .with_section(".text", vec![0xC0; PAGE_SIZE], true)
            .with_section(".data", b"data".to_vec(), false),
    )
}

#[test]
fn write_then_read_back_across_pages() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();

    // Straddles data page (vpn 1) and the first stack page (vpn 2).
    let va = vpn(1).join(PageOffset::new(PAGE_SIZE - 3));
    let data: Vec<u8> = (0..10).collect();
    assert_eq!(k.write_virtual_memory(&p, va, &data).unwrap(), 10);

    let mut back = vec![0; 10];
    assert_eq!(k.read_virtual_memory(&p, va, &mut back).unwrap(), 10);
    assert_eq!(back, data);
    k.check_invariants().unwrap();
}

#[test]
fn access_memory_honours_offset_and_length() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    let va = vpn(2).base();

    let mut src = *b"xxHELLOxx";
    assert_eq!(k.access_memory(&p, va, &mut src, 2, 5, AccessKind::Write).unwrap(), 5);

    let mut dst = [0u8; 9];
    assert_eq!(k.access_memory(&p, va, &mut dst, 4, 5, AccessKind::Read).unwrap(), 5);
    assert_eq!(&dst, b"\0\0\0\0HELLO");
}

#[test]
#[should_panic(expected = "exceeds")]
fn access_memory_rejects_buffer_overrun() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    let mut buf = [0u8; 4];
    let _ = k.access_memory(&p, VirtualAddress::zero(), &mut buf, 2, 3, AccessKind::Read);
}

#[test]
fn first_touch_loads_section_content_and_zero_fills_the_rest() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    assert_eq!(p.resident_pages(), 0);

    let mut text = [0u8; 4];
    k.read_virtual_memory(&p, VirtualAddress::new(100), &mut text).unwrap();
    assert_eq!(text, [0xC0; 4]);

    let mut data = [0u8; 6];
    k.read_virtual_memory(&p, vpn(1).base(), &mut data).unwrap();
    assert_eq!(&data, b"data\0\0");

    let mut stack = [0xFFu8; 8];
    k.read_virtual_memory(&p, vpn(3).base(), &mut stack).unwrap();
    assert_eq!(stack, [0; 8]);

    assert_eq!(p.resident_pages(), 3);
    assert_eq!(k.stats().faults, 3);
}

#[test]
fn copy_stops_at_the_end_of_the_address_space() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    let last = vpn(u32::try_from(p.num_pages() - 1).unwrap());

    let va = last.join(PageOffset::new(PAGE_SIZE - 4));
    assert_eq!(k.write_virtual_memory(&p, va, &[1; 10]).unwrap(), 4);

    let beyond = vpn(u32::try_from(p.num_pages()).unwrap()).base();
    let mut buf = [0u8; 4];
    assert_eq!(k.read_virtual_memory(&p, beyond, &mut buf).unwrap(), 0);

    let top = VirtualAddress::new(u32::MAX);
    assert_eq!(k.read_virtual_memory(&p, top, &mut buf).unwrap(), 0);
}

#[test]
fn write_to_read_only_page_is_rejected_before_populating() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    let free = k.free_frames();

    assert_eq!(
        k.write_virtual_memory(&p, VirtualAddress::new(8), b"nope"),
        Err(VmError::ReadOnlyViolation { pid: p.id(), vpn: vpn(0) })
    );
    assert_eq!(k.free_frames(), free);
    assert_eq!(p.translate(vpn(0)), None);

    let mut b = [0u8; 1];
    k.read_virtual_memory(&p, VirtualAddress::new(8), &mut b).unwrap();
    assert_eq!(b, [0xC0]);
}

#[test]
fn writes_set_dirty_and_reads_do_not() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();

    let mut b = [0u8; 1];
    k.read_virtual_memory(&p, vpn(1).base(), &mut b).unwrap();
    assert!(!p.entry(vpn(1)).unwrap().is_dirty());

    k.write_virtual_memory(&p, vpn(1).base(), b"D").unwrap();
    let e = p.entry(vpn(1)).unwrap();
    assert!(e.is_dirty());
    assert!(e.is_referenced());
}

#[test]
fn fault_outside_the_process_is_a_segmentation_fault() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    let outside = vpn(u32::try_from(p.num_pages()).unwrap());
    assert_eq!(
        k.handle_fault(&p, outside),
        Err(VmError::SegmentationFault { pid: p.id(), vpn: outside })
    );
    assert_eq!(k.free_frames(), 8);
}

#[test]
fn handle_fault_makes_the_page_resident_and_unpinned() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    k.handle_fault(&p, vpn(1)).unwrap();

    let pfn = p.translate(vpn(1)).unwrap();
    let info = k.frame_info(pfn).unwrap();
    assert_eq!(info.owner, Some(p.id()));
    assert_eq!(info.vpn, vpn(1));
    assert!(!info.is_pinned());
    assert!(info.referenced);

    // A second fault on a resident page changes nothing.
    k.handle_fault(&p, vpn(1)).unwrap();
    assert_eq!(k.stats().faults, 1);
}

#[test]
fn arguments_are_laid_out_in_the_last_page() {
    let k = kernel(8);
    let p = k.spawn(program(), &["prog", "-v"], PagingMode::Demand).unwrap();
    assert_eq!(p.argc(), 2);
    assert_eq!(p.entry_point(), VirtualAddress::new(0x20));
    assert_eq!(p.initial_stack_pointer(), p.argv());

    let mut table = [0u8; 8];
    k.read_virtual_memory(&p, p.argv(), &mut table).unwrap();
    let first = u32::from_le_bytes(table[0..4].try_into().unwrap());
    let second = u32::from_le_bytes(table[4..8].try_into().unwrap());
    assert_eq!(first, p.argv().as_u32() + 8);
    assert_eq!(second, first + 5);

    let arg0 = k.read_virtual_memory_string(&p, VirtualAddress::new(first), 16).unwrap();
    let arg1 = k.read_virtual_memory_string(&p, VirtualAddress::new(second), 16).unwrap();
    assert_eq!(arg0.as_deref(), Some("prog"));
    assert_eq!(arg1.as_deref(), Some("-v"));
}

#[test]
fn string_without_terminator_is_none() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    let va = vpn(2).base();
    k.write_virtual_memory(&p, va, b"abcdef").unwrap();

    assert_eq!(k.read_virtual_memory_string(&p, va, 3).unwrap(), None);
    assert_eq!(k.read_virtual_memory_string(&p, va, 6).unwrap().as_deref(), Some("abcdef"));
}

#[test]
fn string_read_with_huge_limit_stops_at_the_address_space() {
    let k = kernel(8);
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    let va = vpn(2).base();
    k.write_virtual_memory(&p, va, b"stack\0").unwrap();
    assert_eq!(
        k.read_virtual_memory_string(&p, va, usize::MAX).unwrap().as_deref(),
        Some("stack")
    );

    let last = vpn(u32::try_from(p.num_pages() - 1).unwrap());
    let tail = last.join(PageOffset::new(PAGE_SIZE - 2));
    k.write_virtual_memory(&p, tail, b"ab").unwrap();
    assert_eq!(k.read_virtual_memory_string(&p, tail, usize::MAX).unwrap(), None);

    let beyond = vpn(u32::try_from(p.num_pages()).unwrap()).base();
    assert_eq!(k.read_virtual_memory_string(&p, beyond, usize::MAX).unwrap(), None);
}

#[test]
fn oversized_arguments_are_rejected() {
    let k = kernel(8);
    let long = "x".repeat(PAGE_SIZE);
    assert_eq!(
        k.spawn(program(), &[long.as_str()], PagingMode::Demand).unwrap_err(),
        VmError::ArgumentsTooLong(4 + PAGE_SIZE + 1)
    );
    assert_eq!(k.free_frames(), 8);
}

#[test]
fn fragmented_executable_is_rejected() {
    let k = kernel(8);
    let image = MemoryImage::new()
        .with_section(".text", vec![0; 10], true)
        .with_section_at(".data", vpn(4), vec![0; 10], false);
    assert!(matches!(
        k.spawn(Arc::new(image), &[], PagingMode::Demand),
        Err(VmError::FragmentedExecutable { section: 1, .. })
    ));
}

#[test]
fn eager_paging_loads_everything_up_front() {
    let k = kernel(8);
    let p = k.spawn(program(), &["x"], PagingMode::Eager).unwrap();
    assert_eq!(p.num_pages(), 2 + 2 + 1);
    assert_eq!(p.resident_pages(), p.num_pages());
    assert_eq!(k.free_frames(), 8 - p.num_pages());
    assert!((0..p.num_pages()).all(|v| !k
        .frame_info(p.translate(vpn(u32::try_from(v).unwrap())).unwrap())
        .unwrap()
        .is_pinned()));
    k.check_invariants().unwrap();
}

#[test]
fn eager_paging_rejects_images_larger_than_memory() {
    let k = kernel(4);
    assert_eq!(
        k.spawn(program(), &[], PagingMode::Eager).unwrap_err(),
        VmError::InsufficientMemory { needed: 5, available: 4 }
    );
    assert_eq!(k.free_frames(), 4);
    k.check_invariants().unwrap();
}

#[test]
fn teardown_returns_every_frame() {
    let k = kernel(8);
    let p = k.spawn(program(), &["a"], PagingMode::Demand).unwrap();
    k.write_virtual_memory(&p, vpn(1).base(), b"zz").unwrap();
    assert!(k.free_frames() < 8);
    assert!(k.process(p.id()).is_some());

    k.release_all_frames(&p);
    assert_eq!(k.free_frames(), 8);
    assert_eq!(p.resident_pages(), 0);
    assert!(k.process(p.id()).is_none());
    k.check_invariants().unwrap();

    k.release_all_frames(&p);
    assert_eq!(k.free_frames(), 8);

    assert_eq!(
        k.write_virtual_memory(&p, vpn(1).base(), b"late"),
        Err(VmError::ProcessExited(p.id()))
    );
    assert_eq!(k.free_frames(), 8);
    k.check_invariants().unwrap();
}

/// Image whose section content can never be read.
struct Unreadable(MemoryImage);

impl ExecutableImage for Unreadable {
    fn sections(&self) -> &[Section] {
        self.0.sections()
    }

    fn entry_point(&self) -> VirtualAddress {
        self.0.entry_point()
    }

    fn load_page(&self, section: usize, _page_index: usize, _frame: &mut [u8]) -> Result<(), LoadError> {
        Err(LoadError::NoSuchSection(section))
    }
}

#[test]
fn failed_section_load_returns_the_frame() {
    let k = kernel(8);
    let image = Unreadable(MemoryImage::new().with_section(".data", vec![1; 10], false));
    let p = k.spawn(Arc::new(image), &[], PagingMode::Demand).unwrap();

    assert_eq!(
        k.handle_fault(&p, vpn(0)),
        Err(VmError::Load(LoadError::NoSuchSection(0)))
    );
    assert_eq!(k.free_frames(), 8);
    assert_eq!(p.translate(vpn(0)), None);
    assert_eq!(k.stats().faults, 0);
    k.check_invariants().unwrap();

    // Stack pages never ask the image.
    k.handle_fault(&p, vpn(1)).unwrap();
    assert_eq!(k.free_frames(), 7);
}

#[test]
fn failed_section_load_after_eviction_frees_the_victim_frame() {
    let k = kernel(2);
    let good = k.spawn(program(), &[], PagingMode::Demand).unwrap();
    k.handle_fault(&good, vpn(0)).unwrap();
    k.handle_fault(&good, vpn(1)).unwrap();
    assert_eq!(k.free_frames(), 0);

    let image = Unreadable(MemoryImage::new().with_section(".data", vec![1; 10], false));
    let bad = k.spawn(Arc::new(image), &[], PagingMode::Demand).unwrap();
    assert!(matches!(k.handle_fault(&bad, vpn(0)), Err(VmError::Load(_))));

    assert_eq!(k.stats().evictions, 1);
    assert_eq!(k.free_frames(), 1);
    assert_eq!(good.resident_pages(), 1);
    k.check_invariants().unwrap();
}

/// Swap device that accepts pages but fails every read.
struct BrokenSwap;

impl SwapStore for BrokenSwap {
    fn store(&self, _owner: ProcessId, _vpn: VirtualPageNumber, _frame: &[u8]) -> Result<(), SwapError> {
        Ok(())
    }

    fn load(&self, _owner: ProcessId, _vpn: VirtualPageNumber, frame: &mut [u8]) -> Result<bool, SwapError> {
        Err(SwapError::BadFrameSize(frame.len()))
    }

    fn discard(&self, _owner: ProcessId) {}
}

#[test]
fn failed_swap_in_reaches_the_caller() {
    let k = VmKernel::new(
        VmConfig::default().with_frame_count(4).with_stack_pages(1),
        Arc::new(BrokenSwap),
    );
    let p = k.spawn(program(), &[], PagingMode::Demand).unwrap();

    let mut b = [0u8; 1];
    assert_eq!(
        k.read_virtual_memory(&p, vpn(1).base(), &mut b),
        Err(VmError::Swap(SwapError::BadFrameSize(PAGE_SIZE)))
    );
    assert_eq!(k.free_frames(), 4);
    assert!((0..4).all(|i| !k.frame_info(PhysicalFrameNumber::new(i)).unwrap().is_pinned()));
    k.check_invariants().unwrap();

    // Argument setup fails the same way and leaves nothing behind.
    assert_eq!(
        k.spawn(program(), &["x"], PagingMode::Demand).unwrap_err(),
        VmError::Swap(SwapError::BadFrameSize(PAGE_SIZE))
    );
    assert_eq!(k.free_frames(), 4);
    k.check_invariants().unwrap();
}
