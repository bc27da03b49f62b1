//! Shell widget scripts for line-editor integration.
//!
//! `eval "$(cheatmd widget bash)"` binds Ctrl+G to replace the current
//! command line with a resolved cheat, using `--match` when the line
//! already holds a partial command.

const BASH_WIDGET: &str = r#"#!/usr/bin/env bash

_cheatmd_widget() {
   local -r input="${READLINE_LINE}"

   local output
   if [ -z "${input}" ]; then
      output="$(cheatmd --print)"
   else
      output="$(cheatmd --print --match "$input")"
   fi

   if [ -n "$output" ]; then
      READLINE_LINE="$output"
      READLINE_POINT=${#READLINE_LINE}
   fi
}

if [ ${BASH_VERSION:0:1} -lt 4 ]; then
   echo "cheatmd widget requires bash 4+" >&2
else
   bind -x '"\C-g": _cheatmd_widget'
fi
"#;

const ZSH_WIDGET: &str = r#"#!/usr/bin/env zsh

_cheatmd_widget() {
   local input="$BUFFER"

   local output
   if [ -z "$input" ]; then
      output="$(cheatmd --print)"
   else
      output="$(cheatmd --print --match "$input")"
   fi

   if [ -n "$output" ]; then
      BUFFER="$output"
      CURSOR=${#BUFFER}
   fi

   zle reset-prompt
}

zle -N _cheatmd_widget
bindkey '^g' _cheatmd_widget
"#;

const FISH_WIDGET: &str = r#"function _cheatmd_widget
   set -l input (commandline)

   if test -z "$input"
      set output (cheatmd --print)
   else
      set output (cheatmd --print --match "$input")
   end

   if test -n "$output"
      commandline -r "$output"
      commandline -f end-of-line
   end

   commandline -f repaint
end

bind \cg _cheatmd_widget
"#;

/// The integration script for a shell, or `None` for unsupported shells.
pub fn widget_script(shell: &str) -> Option<&'static str> {
    match shell {
        "bash" => Some(BASH_WIDGET),
        "zsh" => Some(ZSH_WIDGET),
        "fish" => Some(FISH_WIDGET),
        _ => None,
    }
}
