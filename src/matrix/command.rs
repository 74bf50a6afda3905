//! Builder command line construction

use std::path::{Path, PathBuf};

use super::{Board, Sketch};
use crate::config::ToolchainLayout;

/// Produces the argument vector of one build
///
/// Pure: the same board and sketch always give the same vector.
#[derive(Debug, Clone)]
pub struct CommandBuilder<'a> {
    layout: &'a ToolchainLayout,
    ide_version: &'a str,
    scratch: PathBuf,
    per_board_build_path: bool,
    verbose: bool,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(layout: &'a ToolchainLayout, ide_version: &'a str, scratch: PathBuf) -> Self {
        Self {
            layout,
            ide_version,
            scratch,
            per_board_build_path: false,
            verbose: false,
        }
    }

    /// Give every board its own subdirectory of the scratch directory
    pub fn per_board_build_path(mut self, enabled: bool) -> Self {
        self.per_board_build_path = enabled;
        self
    }

    /// Pass `-verbose` to the builder
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Directory the builder writes into for `board`
    pub fn build_path(&self, board: &Board) -> PathBuf {
        if self.per_board_build_path {
            self.scratch.join(&board.dir_name)
        } else {
            self.scratch.clone()
        }
    }

    /// Full argument vector, the builder executable first
    pub fn command(&self, board: &Board, sketch: &Sketch) -> Vec<String> {
        let mut cmd = vec![display(&self.layout.builder)];

        for dir in &self.layout.hardware_dirs {
            cmd.push("-hardware".to_string());
            cmd.push(display(dir));
        }
        for dir in &self.layout.tools_dirs {
            cmd.push("-tools".to_string());
            cmd.push(display(dir));
        }
        for dir in &self.layout.library_dirs {
            cmd.push("-libraries".to_string());
            cmd.push(display(dir));
        }

        cmd.push("-fqbn".to_string());
        cmd.push(board.variant_string());
        cmd.push(format!("-ide-version={}", self.ide_version));
        cmd.push("-build-path".to_string());
        cmd.push(display(&self.build_path(board)));
        cmd.push("-warnings=all".to_string());
        if self.verbose {
            cmd.push("-verbose".to_string());
        }
        cmd.push(display(&sketch.path));
        cmd
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::test_board;

    fn layout() -> ToolchainLayout {
        let root = PathBuf::from("/ide");
        let packages = PathBuf::from("/home/u/.arduino15/packages");
        let sketchbook = PathBuf::from("/home/u/Arduino");
        ToolchainLayout {
            builder: root.join("arduino-builder"),
            hardware_dirs: vec![root.join("hardware"), packages.clone()],
            tools_dirs: vec![root.join("tools-builder"), packages.clone()],
            library_dirs: vec![root.join("libraries"), sketchbook.join("libraries")],
            root,
            packages,
            sketchbook,
        }
    }

    fn blink() -> Sketch {
        Sketch::new(PathBuf::from("/ide/examples/01.Basics/Blink/Blink.ino"))
    }

    #[test]
    fn test_command_vector() {
        let layout = layout();
        let builder = CommandBuilder::new(&layout, "10805", PathBuf::from("/tmp/scratch"));
        let cmd = builder.command(&test_board("Nucleo_64", "NUCLEO_F411RE"), &blink());

        let expected = vec![
            "/ide/arduino-builder",
            "-hardware",
            "/ide/hardware",
            "-hardware",
            "/home/u/.arduino15/packages",
            "-tools",
            "/ide/tools-builder",
            "-tools",
            "/home/u/.arduino15/packages",
            "-libraries",
            "/ide/libraries",
            "-libraries",
            "/home/u/Arduino/libraries",
            "-fqbn",
            "STM32:stm32:Nucleo_64:pnum=NUCLEO_F411RE,upload_method=STLink,xserial=generic,opt=osstd",
            "-ide-version=10805",
            "-build-path",
            "/tmp/scratch",
            "-warnings=all",
            "/ide/examples/01.Basics/Blink/Blink.ino",
        ];
        assert_eq!(cmd, expected);
    }

    #[test]
    fn test_verbose_flag_before_sketch() {
        let layout = layout();
        let builder =
            CommandBuilder::new(&layout, "10805", PathBuf::from("/tmp/scratch")).verbose(true);
        let cmd = builder.command(&test_board("Nucleo_64", "NUCLEO_F411RE"), &blink());

        assert_eq!(cmd[cmd.len() - 2], "-verbose");
        assert_eq!(cmd[cmd.len() - 1], "/ide/examples/01.Basics/Blink/Blink.ino");
    }

    #[test]
    fn test_command_is_pure() {
        let layout = layout();
        let builder = CommandBuilder::new(&layout, "10805", PathBuf::from("/tmp/scratch"));
        let board = test_board("Nucleo_64", "NUCLEO_F411RE");

        assert_eq!(builder.command(&board, &blink()), builder.command(&board, &blink()));
    }

    #[test]
    fn test_boards_differ_only_in_variant_and_build_path() {
        let layout = layout();
        let builder = CommandBuilder::new(&layout, "10805", PathBuf::from("/tmp/scratch"))
            .per_board_build_path(true);
        let a = builder.command(&test_board("Nucleo_64", "NUCLEO_F411RE"), &blink());
        let b = builder.command(&test_board("Nucleo_64", "NUCLEO_L476RG"), &blink());

        assert_eq!(a.len(), b.len());
        let differing: Vec<usize> = (0..a.len()).filter(|&i| a[i] != b[i]).collect();
        let fqbn = a.iter().position(|s| s == "-fqbn").unwrap() + 1;
        let build_path = a.iter().position(|s| s == "-build-path").unwrap() + 1;
        assert_eq!(differing, vec![fqbn, build_path]);
        assert_eq!(b[build_path], "/tmp/scratch/NUCLEO_L476RG");
    }
}
